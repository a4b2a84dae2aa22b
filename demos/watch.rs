use std::env;
use std::sync::atomic::AtomicBool;

use fanotify_watcher::{EffectKind, PathKind};

fn main() {
    let current_dir = env::current_dir().expect("failed to determine current directory");

    println!("Watching {} for activity...", current_dir.display());

    let is_running = AtomicBool::new(true);
    let ok = fanotify_watcher::watch(
        &current_dir,
        |event| {
            if event.kind == PathKind::Watcher {
                eprintln!("diagnostic: {}", event.path.display());
                return;
            }

            let kind = match event.kind {
                PathKind::Directory => "Directory",
                PathKind::File => "File",
                PathKind::Watcher => unreachable!(),
            };
            match event.effect {
                EffectKind::Create => println!("{} created: {:?}", kind, event.path),
                EffectKind::Destroy => println!("{} deleted: {:?}", kind, event.path),
                EffectKind::Modify => println!("{} modified: {:?}", kind, event.path),
                EffectKind::Rename => println!("{} renamed: {:?}", kind, event.path),
                EffectKind::Other => {}
            }
        },
        &is_running,
    );

    if !ok {
        eprintln!("watch ended with an error; re-run with RUST_LOG=debug for details");
    }
}
