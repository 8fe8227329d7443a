use std::fs;
use std::path::Path;

use crate::cluster::Cluster;
use crate::errors::DedupeError;
use crate::plan::{Action, PlanEntry};

//Parsing rules shared by all three formats: blank lines are skipped, and a
//row that does not parse is skipped rather than aborting the file.

fn read_lines(path: &Path) -> Result<Vec<String>, DedupeError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(str::to_string).collect()),
        Err(_) => Err(DedupeError::FileError(format!(
            "Error: Failed to read: {}",
            path.display()
        ))),
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), DedupeError> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).map_err(|_| {
        DedupeError::FileError(format!("Error: Failed to write: {}", path.display()))
    })
}

///Write the index: one `path,fingerprint` row per item, fingerprint as an
///unsigned decimal.
pub fn write_index(path: &Path, items: &[(String, u64)]) -> Result<(), DedupeError> {
    let rows: Vec<String> = items
        .iter()
        .map(|(id, hash)| format!("{},{}", id, hash))
        .collect();
    write_lines(path, &rows)
}

///Read an index file back into (path, fingerprint) pairs. Rows split on
///the LAST comma because paths may themselves contain commas.
pub fn read_index(path: &Path) -> Result<Vec<(String, u64)>, DedupeError> {
    let mut items: Vec<(String, u64)> = Vec::new();
    for line in read_lines(path)? {
        if line.trim().is_empty() {
            continue;
        }
        let Some((id, hash_text)) = line.rsplit_once(',') else {
            eprintln!("Warn: Skipping malformed index row: {}", line);
            continue;
        };
        if id.is_empty() {
            eprintln!("Warn: Skipping malformed index row: {}", line);
            continue;
        }
        match hash_text.trim().parse::<u64>() {
            Ok(hash) => items.push((id.to_string(), hash)),
            Err(_) => eprintln!("Warn: Skipping malformed index row: {}", line),
        }
    }
    Ok(items)
}

///Write clusters as `cluster_id,path` rows. Singleton clusters are
///normally filtered; whether they appear is a policy choice, not core
///behaviour.
pub fn write_clusters(
    path: &Path,
    clusters: &[Cluster],
    include_singletons: bool,
) -> Result<(), DedupeError> {
    let mut rows: Vec<String> = Vec::new();
    for cluster in clusters {
        if cluster.members.len() <= 1 && !include_singletons {
            continue;
        }
        for member in &cluster.members {
            rows.push(format!("{},{}", cluster.id, member));
        }
    }
    write_lines(path, &rows)
}

///Read a clusters file back, grouped by cluster id in first-seen order.
///Rows split on the FIRST comma: ids never contain one, paths may.
pub fn read_clusters(path: &Path) -> Result<Vec<(String, Vec<String>)>, DedupeError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<String>> =
        std::collections::HashMap::new();

    for line in read_lines(path)? {
        if line.trim().is_empty() {
            continue;
        }
        let Some((id, member)) = line.split_once(',') else {
            eprintln!("Warn: Skipping malformed cluster row: {}", line);
            continue;
        };
        if id.is_empty() || member.is_empty() {
            eprintln!("Warn: Skipping malformed cluster row: {}", line);
            continue;
        }
        if !groups.contains_key(id) {
            order.push(id.to_string());
        }
        groups
            .entry(id.to_string())
            .or_default()
            .push(member.to_string());
    }

    Ok(order
        .into_iter()
        .map(|id| {
            let members = groups.remove(&id).unwrap_or_default();
            (id, members)
        })
        .collect())
}

pub const PLAN_HEADER: &str = "clusterId,action,path,reason";

pub fn write_plan(path: &Path, entries: &[PlanEntry]) -> Result<(), DedupeError> {
    let mut rows: Vec<String> = Vec::with_capacity(entries.len() + 1);
    rows.push(PLAN_HEADER.to_string());
    for e in entries {
        rows.push(format!(
            "{},{},{},{}",
            e.cluster_id,
            e.action.as_str(),
            e.path,
            e.reason
        ));
    }
    write_lines(path, &rows)
}

///Re-ingest a plan file without losing the action field. The header row
///and blank lines are skipped, as are rows with an unknown action.
pub fn read_plan(path: &Path) -> Result<Vec<PlanEntry>, DedupeError> {
    let mut entries: Vec<PlanEntry> = Vec::new();
    for line in read_lines(path)? {
        if line.trim().is_empty() || line.starts_with("clusterId") {
            continue;
        }
        let parts: Vec<&str> = line.splitn(4, ',').collect();
        if parts.len() < 4 {
            eprintln!("Warn: Skipping malformed plan row: {}", line);
            continue;
        }
        let Some(action) = Action::parse(parts[1]) else {
            eprintln!("Warn: Skipping malformed plan row: {}", line);
            continue;
        };
        entries.push(PlanEntry {
            cluster_id: parts[0].to_string(),
            action,
            path: parts[2].to_string(),
            reason: parts[3].to_string(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_index_round_trip_with_commas_in_paths() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("index.csv");
        let items = vec![
            ("photos/holiday, 2019/img1.jpg".to_string(), 42u64),
            ("plain.png".to_string(), u64::MAX),
        ];

        write_index(&file, &items).unwrap();
        let back = read_index(&file).unwrap();
        assert_eq!(items, back, "Splitting on the last comma recovers paths");
    }

    #[test]
    fn test_index_skips_blank_and_malformed_rows() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("index.csv");
        std::fs::write(
            &file,
            "good.jpg,7\n\nno-comma-here\nbad-hash.jpg,not-a-number\n,123\nalso_good.jpg,9\n",
        )
        .unwrap();

        let back = read_index(&file).unwrap();
        assert_eq!(
            vec![
                ("good.jpg".to_string(), 7u64),
                ("also_good.jpg".to_string(), 9u64)
            ],
            back
        );
    }

    #[test]
    fn test_read_index_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(read_index(&tmp.path().join("absent.csv")).is_err());
    }

    #[test]
    fn test_clusters_round_trip_preserves_first_seen_order() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("clusters.csv");
        let clusters = vec![
            Cluster {
                id: "c1".to_string(),
                members: vec!["a.jpg".to_string(), "b.jpg".to_string()],
            },
            Cluster {
                id: "c2".to_string(),
                members: vec!["x.jpg".to_string(), "y.jpg".to_string()],
            },
        ];

        write_clusters(&file, &clusters, false).unwrap();
        let back = read_clusters(&file).unwrap();
        assert_eq!(2, back.len());
        assert_eq!("c1", back[0].0);
        assert_eq!(vec!["a.jpg", "b.jpg"], back[0].1);
        assert_eq!("c2", back[1].0);
    }

    #[test]
    fn test_singleton_clusters_are_filtered_unless_requested() {
        let tmp = TempDir::new().unwrap();
        let clusters = vec![
            Cluster {
                id: "c1".to_string(),
                members: vec!["lone.jpg".to_string()],
            },
            Cluster {
                id: "c2".to_string(),
                members: vec!["a.jpg".to_string(), "b.jpg".to_string()],
            },
        ];

        let filtered = tmp.path().join("filtered.csv");
        write_clusters(&filtered, &clusters, false).unwrap();
        let back = read_clusters(&filtered).unwrap();
        assert_eq!(1, back.len(), "Singleton filtered by default policy");
        assert_eq!("c2", back[0].0);

        let full = tmp.path().join("full.csv");
        write_clusters(&full, &clusters, true).unwrap();
        let back = read_clusters(&full).unwrap();
        assert_eq!(2, back.len(), "Singleton kept when requested");
    }

    #[test]
    fn test_plan_round_trip_keeps_actions() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plan.csv");
        let entries = vec![
            PlanEntry {
                cluster_id: "c1".to_string(),
                action: Action::Keep,
                path: "best.jpg".to_string(),
                reason: "keeper(pixels=160000,size=9000,mtime=1)".to_string(),
            },
            PlanEntry {
                cluster_id: "c1".to_string(),
                action: Action::Delete,
                path: "worse.jpg".to_string(),
                reason: "dupe(pixels=10000,size=500,mtime=2)".to_string(),
            },
        ];

        write_plan(&file, &entries).unwrap();
        let back = read_plan(&file).unwrap();
        assert_eq!(entries, back);
    }
}
