//! Dependency ordering of deterministic sites.

use crate::graph::site::{Site, SiteError};
use indexmap::IndexMap;
use log::warn;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use smallvec::SmallVec;

/// Orders the deterministic sites so that each one follows every
/// deterministic site among its dependencies.
///
/// Dependencies on sample sites impose no order. Sites without mutual
/// dependencies keep their declaration order.
pub fn deterministic_order(site: &Site) -> Result<Vec<String>, SiteError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(site.deterministic.len(), 0);
    let index: IndexMap<&str, NodeIndex> =
        site.deterministic.keys().map(|name| (name.as_str(), graph.add_node(name.as_str()))).collect();

    for (name, det) in &site.deterministic {
        let consumer = index[name.as_str()];
        for dep in &det.dependencies {
            if let Some(&producer) = index.get(dep.as_str()) {
                graph.add_edge(producer, consumer, ());
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| SiteError::Cycle(graph[cycle.node_id()].to_string()))?;
    Ok(order.into_iter().map(|idx| graph[idx].to_string()).collect())
}

/// Resolves every site of `site` from the sample values.
pub fn replay(site: &Site, samples: &IndexMap<String, f64>) -> Result<IndexMap<String, f64>, SiteError> {
    for name in samples.keys().filter(|name| !site.sample.contains_key(*name)) {
        warn!("ignoring value for '{}': not a sample site", name);
    }

    let mut values = IndexMap::with_capacity(site.sample.len() + site.deterministic.len());
    for (name, prior) in &site.sample {
        let value = samples
            .get(name)
            .copied()
            .or_else(|| prior.fixed_value())
            .ok_or_else(|| SiteError::MissingValue(name.clone()))?;
        values.insert(name.clone(), value);
    }

    for name in deterministic_order(site)? {
        let det = &site.deterministic[&name];
        let args = det
            .dependencies
            .iter()
            .map(|dep| values.get(dep).copied().ok_or_else(|| SiteError::MissingValue(dep.clone())))
            .collect::<Result<SmallVec<[f64; 2]>, _>>()?;
        values.insert(name, det.evaluate(&args));
    }
    Ok(values)
}
