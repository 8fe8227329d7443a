use std::collections::HashMap;

use crate::fingerprint::distance;

//Nodes live in a flat arena and reference children by index, which keeps
//the tree free of ownership cycles under mutation.
struct Node {
    key: u64,
    ids: Vec<String>,
    //Edge label is the exact Hamming distance of every fingerprint in the
    //child subtree from this node's key
    children: HashMap<u32, usize>,
}

impl Node {
    fn new(key: u64, id: String) -> Node {
        Node {
            key,
            ids: vec![id],
            children: HashMap::new(),
        }
    }
}

///A BK-tree over 64-bit fingerprints under Hamming distance. Built once by
///sequential insertion, then queried read-only; insertion order affects
///the shape but never query results.
pub struct BkTree {
    nodes: Vec<Node>,
    #[cfg(test)]
    queries: std::cell::Cell<usize>,
}

impl BkTree {
    pub fn new() -> BkTree {
        BkTree {
            nodes: Vec::new(),
            #[cfg(test)]
            queries: std::cell::Cell::new(0),
        }
    }

    //Number of query() calls made against this tree
    #[cfg(test)]
    pub fn query_count(&self) -> usize {
        self.queries.get()
    }

    ///Associate an item id with a fingerprint. Items sharing an exact
    ///fingerprint share one node's bucket.
    pub fn insert(&mut self, key: u64, id: String) {
        if self.nodes.is_empty() {
            self.nodes.push(Node::new(key, id));
            return;
        }
        let mut cur = 0usize;
        loop {
            let d = distance(key, self.nodes[cur].key);
            if d == 0 {
                self.nodes[cur].ids.push(id);
                return;
            }
            match self.nodes[cur].children.get(&d) {
                Some(&next) => cur = next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::new(key, id));
                    self.nodes[cur].children.insert(d, next);
                    return;
                }
            }
        }
    }

    ///Every item id whose fingerprint is within `radius` (inclusive) of
    ///`key`. Depth-first; the triangle inequality restricts descent to
    ///child edges labelled within [dist - radius, dist + radius].
    pub fn query(&self, key: u64, radius: u32) -> Vec<&str> {
        #[cfg(test)]
        self.queries.set(self.queries.get() + 1);

        let mut out: Vec<&str> = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack: Vec<usize> = vec![0];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            let dist = distance(key, node.key);
            if dist <= radius {
                out.extend(node.ids.iter().map(String::as_str));
            }
            let lo = dist.saturating_sub(radius);
            let hi = dist + radius;
            for (&edge, &child) in &node.children {
                if edge >= lo && edge <= hi {
                    stack.push(child);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<&str>) -> Vec<&str> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_query_empty_tree() {
        let tree = BkTree::new();
        assert!(tree.query(12345, 2).is_empty(), "Empty tree yields nothing");
    }

    #[test]
    fn test_insert_and_exact_query() {
        let mut tree = BkTree::new();
        tree.insert(0b1100, "id1".to_string());
        assert_eq!(vec!["id1"], tree.query(0b1100, 0));
    }

    #[test]
    fn test_query_within_radius() {
        let mut tree = BkTree::new();
        tree.insert(0b1100, "id1".to_string());
        //0b1100 vs 0b1101 differ by one bit
        assert_eq!(vec!["id1"], tree.query(0b1101, 1));
    }

    #[test]
    fn test_query_outside_radius() {
        let mut tree = BkTree::new();
        tree.insert(0b1100, "id1".to_string());
        //0b1100 vs 0b0011 differ by four bits
        assert!(tree.query(0b0011, 2).is_empty());
    }

    #[test]
    fn test_equal_fingerprints_share_a_bucket() {
        let mut tree = BkTree::new();
        tree.insert(0b101010, "id1".to_string());
        tree.insert(0b101010, "id2".to_string());
        assert_eq!(vec!["id1", "id2"], sorted(tree.query(0b101010, 0)));
    }

    #[test]
    fn test_query_radius_is_inclusive_and_monotonic() {
        let mut tree = BkTree::new();
        let probe: u64 = 0b1111_0000;
        tree.insert(0b1111_0000, "id1".to_string()); //dist 0
        tree.insert(0b1111_0001, "id2".to_string()); //dist 1
        tree.insert(0b1111_0011, "id3".to_string()); //dist 2
        tree.insert(0b1111_1111, "id4".to_string()); //dist 4
        tree.insert(0b0000_0000, "id5".to_string()); //dist 4

        assert_eq!(vec!["id1"], sorted(tree.query(probe, 0)));
        assert_eq!(vec!["id1", "id2"], sorted(tree.query(probe, 1)));
        assert_eq!(vec!["id1", "id2", "id3"], sorted(tree.query(probe, 2)));
        assert_eq!(
            vec!["id1", "id2", "id3"],
            sorted(tree.query(probe, 3)),
            "No item sits at distance 3"
        );
        assert_eq!(
            vec!["id1", "id2", "id3", "id4", "id5"],
            sorted(tree.query(probe, 4))
        );

        //Growing the radius can only grow the result set
        for r in 0..8u32 {
            let smaller = sorted(tree.query(probe, r));
            let larger = sorted(tree.query(probe, r + 1));
            assert!(
                smaller.iter().all(|id| larger.contains(id)),
                "query(h, {}) is a subset of query(h, {})",
                r,
                r + 1
            );
        }
    }

    #[test]
    fn test_query_with_no_matches() {
        let mut tree = BkTree::new();
        tree.insert(1, "id1".to_string());
        tree.insert(10, "id2".to_string());
        tree.insert(100, "id3".to_string());
        assert!(tree.query(1000, 1).is_empty());
    }

    #[test]
    fn test_every_inserted_item_is_found_at_radius_zero() {
        let mut tree = BkTree::new();
        let keys = [0u64, 7, 1 << 40, u64::MAX, 0xAAAA_5555_AAAA_5555];
        for (i, &k) in keys.iter().enumerate() {
            tree.insert(k, format!("id{}", i));
        }
        for (i, &k) in keys.iter().enumerate() {
            let hits = tree.query(k, 0);
            assert!(hits.contains(&format!("id{}", i).as_str()));
        }
    }
}
