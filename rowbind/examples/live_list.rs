//! Live List Example
//!
//! Binds a reactive list to an in-memory tree and prints the container
//! contents as mutations batch through the tick scheduler.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use rowbind::prelude::*;
use simplelog::{Config, LevelFilter, WriteLogger};

#[derive(Debug)]
struct Task {
    title: String,
}

fn task(title: &str) -> Arc<Task> {
    Arc::new(Task {
        title: title.into(),
    })
}

fn print_state(label: &str, controller: &Controller<Task, MemTree>) {
    let items = controller.rendered_items();
    let titles: Vec<&str> = items.iter().map(|t| t.title.as_str()).collect();
    println!("{label}: {titles:?}");
}

#[tokio::main]
async fn main() {
    // Set up file logging
    let log_file = File::create("live_list.log").expect("Failed to create log file");
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)
        .expect("Failed to initialize logger");

    let tree = Arc::new(MemTree::new());
    let container = tree.element();
    let template = tree.element();
    tree.append(container, template);

    let tasks: ReactiveList<Task> = ReactiveList::new();
    let controller = attach(
        Arc::clone(&tree),
        container,
        BindConfig::new(tasks.clone())
            .batch_size_for_add(2)
            .bind_item(|node, item| {
                println!("bound {} -> {node}", item.title);
            }),
    )
    .expect("container holds exactly one template");

    tasks.push(task("write the report"));
    tasks.push(task("review the patch"));
    tasks.push(task("ship the release"));
    tasks.push(task("close the milestone"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_state("after inserts", &controller);

    // Reorder without recreating any nodes.
    tasks.update(|items| items.reverse());
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_state("after reverse", &controller);

    tasks.remove(0);
    tasks.remove(0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_state("after removals", &controller);

    controller.dispose();
}
