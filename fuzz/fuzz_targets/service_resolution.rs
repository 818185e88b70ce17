#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_registry::{Built, Container, Context};

/// Returns true if a cycle is reachable from `start`.
fn cycle_reachable(edges: &[Vec<usize>], start: usize) -> bool {
    fn visit(edges: &[Vec<usize>], node: usize, on_path: &mut Vec<bool>, done: &mut Vec<bool>) -> bool {
        if on_path[node] {
            return true;
        }
        if done[node] {
            return false;
        }
        on_path[node] = true;
        let found = edges[node].iter().any(|&next| visit(edges, next, on_path, done));
        on_path[node] = false;
        done[node] = true;
        found
    }
    visit(edges, start, &mut vec![false; edges.len()], &mut vec![false; edges.len()])
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the node count, the rest are edges as (from, to) nibbles.
    let nodes = usize::from(data[0] % 8) + 1;
    let mut edges = vec![Vec::new(); nodes];
    for &byte in &data[1..data.len().min(24)] {
        let from = usize::from(byte >> 4) % nodes;
        let to = usize::from(byte & 0x0f) % nodes;
        edges[from].push(to);
    }

    let container = Container::new();
    for (node, deps) in edges.iter().enumerate() {
        let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        container
            .set::<usize, _, _>(node.to_string(), move |ctx, ctn| {
                let deps = deps.clone();
                async move {
                    let mut sum = 1;
                    for dep in &deps {
                        sum += *ctn.get::<usize>(&ctx, dep).await?;
                    }
                    Ok(Built::new(sum))
                }
            })
            .unwrap();
    }

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let ctx = Context::background();
        for start in 0..nodes {
            let result = container.get_dependency::<usize>(&ctx, &start.to_string()).await;
            match result {
                Ok(tree) => {
                    assert!(!cycle_reachable(&edges, start));
                    let children: Vec<String> = tree.children.iter().map(|c| c.name.clone()).collect();
                    let expected: Vec<String> = edges[start].iter().map(|d| d.to_string()).collect();
                    assert_eq!(children, expected);
                }
                Err(err) => {
                    assert!(err.is_cycle());
                    assert!(cycle_reachable(&edges, start));
                }
            }
        }
        container.close(&ctx).await.unwrap();
    });
});
