//! Emission order for type aliases and structures.
//!
//! Both orders are a depth-first post-order over input order: a declaration
//! is emitted after every declaration it depends on, unless the two sit on a
//! cycle. Cycles never fail; each element is emitted exactly once, in the
//! order it was first completed.
use std::collections::HashMap;

use crate::ir::{Structure, TypeAlias};

/// Reorder `aliases` so that an alias follows every alias its type refers to.
pub fn sort_type_aliases(aliases: &mut Vec<TypeAlias>) {
    let order = {
        let index = index_by_name(aliases.iter().map(|a| a.name.as_str()));
        let deps: Vec<Vec<usize>> = aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| {
                alias
                    .ty
                    .references()
                    .into_iter()
                    .filter_map(|r| index.get(r.name.as_str()).copied())
                    .filter(|&dep| dep != i)
                    .collect()
            })
            .collect();
        dependency_order(&deps, |i| aliases[i].name.as_str())
    };
    permute(aliases, &order);
}

/// Reorder `structures` so that a structure follows everything it extends,
/// mixes in, or reaches through its properties (its nested structures'
/// properties included).
pub fn sort_structures(structures: &mut Vec<Structure>) {
    let order = {
        let index = index_by_name(structures.iter().map(|s| s.name.as_str()));
        let deps: Vec<Vec<usize>> = structures
            .iter()
            .enumerate()
            .map(|(i, structure)| {
                structure
                    .types()
                    .into_iter()
                    .flat_map(|ty| ty.references())
                    // `Outer::Inner` is emitted with `Outer`
                    .filter_map(|r| r.name.split("::").next())
                    .filter_map(|root| index.get(root).copied())
                    .filter(|&dep| dep != i)
                    .collect()
            })
            .collect();
        dependency_order(&deps, |i| structures[i].name.as_str())
    };
    permute(structures, &order);
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut index = HashMap::new();
    for (i, name) in names.enumerate() {
        index.entry(name).or_insert(i);
    }
    index
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

enum Step {
    Enter(usize),
    Exit(usize),
}

/// Post-order over `deps`, roots taken in index order, dependencies in list
/// order. Uses an explicit stack so deep chains cannot overflow.
fn dependency_order<'a>(deps: &[Vec<usize>], name_of: impl Fn(usize) -> &'a str) -> Vec<usize> {
    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut order = Vec::with_capacity(deps.len());
    let mut stack = Vec::new();

    for root in 0..deps.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        stack.push(Step::Enter(root));
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(i) => {
                    if marks[i] != Mark::Unvisited {
                        continue;
                    }
                    marks[i] = Mark::OnPath;
                    stack.push(Step::Exit(i));
                    // reversed so the first dependency is visited first
                    for &dep in deps[i].iter().rev() {
                        match marks[dep] {
                            Mark::Unvisited => stack.push(Step::Enter(dep)),
                            Mark::OnPath => tracing::debug!(
                                from = name_of(i),
                                to = name_of(dep),
                                "dependency cycle; emitting in first-completed order",
                            ),
                            Mark::Done => {}
                        }
                    }
                }
                Step::Exit(i) => {
                    marks[i] = Mark::Done;
                    order.push(i);
                }
            }
        }
    }
    order
}

fn permute<T>(items: &mut Vec<T>, order: &[usize]) {
    debug_assert_eq!(items.len(), order.len());
    let mut slots: Vec<Option<T>> = std::mem::take(items).into_iter().map(Some).collect();
    items.extend(order.iter().filter_map(|&i| slots[i].take()));
}
