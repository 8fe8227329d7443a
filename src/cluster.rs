use std::collections::{HashMap, HashSet, VecDeque};

use crate::bktree::BkTree;

///One connected component of the within-radius graph. Membership is
///transitive: two members may only be linked through intermediates, so a
///cluster does not promise pairwise similarity between all members.
pub struct Cluster {
    pub id: String,
    pub members: Vec<String>,
}

///Partition `items` into connected components under `radius`. Every item
///lands in exactly one cluster; iteration order only affects cluster id
///labels, never the partition itself. Each item is queried against the
///index exactly once because items are marked visited when enqueued.
pub fn build_clusters(items: &[(String, u64)], index: &BkTree, radius: u32) -> Vec<Cluster> {
    let fingerprints: HashMap<&str, u64> = items
        .iter()
        .map(|(id, hash)| (id.as_str(), *hash))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut next_cluster = 1u64;

    for (id, _) in items {
        if visited.contains(id.as_str()) {
            continue;
        }

        let mut members: Vec<String> = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(id.as_str());
        visited.insert(id.as_str());

        while let Some(cur) = queue.pop_front() {
            members.push(cur.to_string());
            let hash = fingerprints[cur];
            for neighbour in index.query(hash, radius) {
                if !visited.contains(neighbour) {
                    visited.insert(neighbour);
                    queue.push_back(neighbour);
                }
            }
        }

        clusters.push(Cluster {
            id: format!("c{}", next_cluster),
            members,
        });
        next_cluster += 1;
    }

    clusters
}
