use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Keep => "KEEP",
            Action::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Action> {
        if s.eq_ignore_ascii_case("KEEP") {
            Some(Action::Keep)
        } else if s.eq_ignore_ascii_case("DELETE") {
            Some(Action::Delete)
        } else {
            None
        }
    }
}

///Metadata triple the ranker orders on. Sentinel values push unreadable
///files to the bottom so they are never chosen as keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub pixels: i64,
    pub size: i64,
    pub mtime_ms: i64,
}

impl FileMeta {
    pub const UNREADABLE: FileMeta = FileMeta {
        pixels: -1,
        size: -1,
        mtime_ms: i64::MAX,
    };
}

///Stat a file and probe its pixel dimensions from the header without a
///full decode. A file that cannot be statted gets the full penalty
///sentinel; a statable file that is not a decodable image only loses its
///pixel count.
pub fn probe_meta(path: &Path) -> FileMeta {
    let md = match fs::metadata(path) {
        Ok(md) => md,
        Err(_) => return FileMeta::UNREADABLE,
    };
    let mtime_ms = md
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(i64::MAX);
    let pixels = match image::image_dimensions(path) {
        Ok((w, h)) => i64::from(w) * i64::from(h),
        Err(_) => -1,
    };
    FileMeta {
        pixels,
        size: md.len() as i64,
        mtime_ms,
    }
}

///One row of a deduplication plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub cluster_id: String,
    pub action: Action,
    pub path: String,
    pub reason: String,
}

/**
 * Order cluster members with the following keys
 *  1st) Total number of pixels (descending)
 *  2nd) File size in bytes (descending)
 *  3rd) Modification time (ascending - older files are kept)
 *  4th) The identifier, case-insensitively then case-sensitively
 *
 * The final key makes this a strict total order over distinct
 * identifiers, so plans are reproducible across runs.
 */
fn rank_order(a_id: &str, a: &FileMeta, b_id: &str, b: &FileMeta) -> Ordering {
    if a.pixels != b.pixels {
        return b.pixels.cmp(&a.pixels);
    }
    if a.size != b.size {
        return b.size.cmp(&a.size);
    }
    if a.mtime_ms != b.mtime_ms {
        return a.mtime_ms.cmp(&b.mtime_ms);
    }
    let folded = a_id.to_lowercase().cmp(&b_id.to_lowercase());
    if folded != Ordering::Equal {
        return folded;
    }
    a_id.cmp(b_id)
}

///Rank one cluster's members and mark the best as KEEP, the rest DELETE.
///`meta_for` supplies the metadata triple per member (probe_meta in
///production, fixtures in tests).
pub fn rank_and_plan<F>(cluster_id: &str, members: &[String], meta_for: F) -> Vec<PlanEntry>
where
    F: Fn(&str) -> FileMeta,
{
    let mut ranked: Vec<(String, FileMeta)> = members
        .iter()
        .map(|m| (m.clone(), meta_for(m)))
        .collect();
    ranked.sort_by(|a, b| rank_order(&a.0, &a.1, &b.0, &b.1));

    let mut entries = Vec::with_capacity(ranked.len());
    for (i, (path, meta)) in ranked.into_iter().enumerate() {
        let (action, label) = if i == 0 {
            (Action::Keep, "keeper")
        } else {
            (Action::Delete, "dupe")
        };
        entries.push(PlanEntry {
            cluster_id: cluster_id.to_string(),
            action,
            path,
            reason: format!(
                "{}(pixels={},size={},mtime={})",
                label, meta.pixels, meta.size, meta.mtime_ms
            ),
        });
    }
    entries
}
