//! Client-side breakpoint bookkeeping.
//!
//! DAP replaces all breakpoints of a file on every `setBreakpoints`, so the
//! manager keeps the full per-file list and rebuilds the request from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::protocol::{BreakpointResponse, SetBreakpointsArguments, Source, SourceBreakpoint};

/// A client-side breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    /// Number shown to the user and accepted by `delete`.
    pub id: u32,
    pub path: PathBuf,
    /// 1-based line.
    pub line: i64,
    pub condition: Option<String>,
    /// Whether the adapter has verified this breakpoint.
    pub verified: bool,
    /// Adapter-assigned ID, used to match `breakpoint` events.
    pub adapter_id: Option<i64>,
}

impl Breakpoint {
    /// `path:line`, plus the condition when present.
    pub fn location(&self) -> String {
        match &self.condition {
            Some(cond) => format!("{}:{} if {}", self.path.display(), self.line, cond),
            None => format!("{}:{}", self.path.display(), self.line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakpointManager {
    by_file: BTreeMap<PathBuf, Vec<Breakpoint>>,
    next_id: u32,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self {
            by_file: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Add a breakpoint and return its id. Adding the same location twice
    /// updates the condition of the existing breakpoint instead.
    pub fn add(&mut self, path: PathBuf, line: i64, condition: Option<String>) -> u32 {
        let list = self.by_file.entry(path.clone()).or_default();
        if let Some(existing) = list.iter_mut().find(|bp| bp.line == line) {
            existing.condition = condition;
            existing.verified = false;
            return existing.id;
        }
        let id = self.next_id;
        self.next_id += 1;
        list.push(Breakpoint {
            id,
            path,
            line,
            condition,
            verified: false,
            adapter_id: None,
        });
        id
    }

    /// Remove by id, returning the removed breakpoint.
    pub fn remove(&mut self, id: u32) -> Option<Breakpoint> {
        let path = self
            .by_file
            .iter()
            .find(|(_, list)| list.iter().any(|bp| bp.id == id))
            .map(|(path, _)| path.clone())?;
        let list = self.by_file.get_mut(&path)?;
        let pos = list.iter().position(|bp| bp.id == id)?;
        let removed = list.remove(pos);
        // The (possibly empty) entry is kept so the next sync clears the file.
        Some(removed)
    }

    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.all().find(|bp| bp.id == id)
    }

    pub fn get_for_file(&self, path: &Path) -> &[Breakpoint] {
        self.by_file.get(path).map_or(&[], |v| v.as_slice())
    }

    /// Every breakpoint, ordered by id.
    pub fn sorted(&self) -> Vec<&Breakpoint> {
        let mut all: Vec<&Breakpoint> = self.all().collect();
        all.sort_by_key(|bp| bp.id);
        all
    }

    pub fn all(&self) -> impl Iterator<Item = &Breakpoint> {
        self.by_file.values().flat_map(|v| v.iter())
    }

    /// Files with breakpoint state to send, including files whose last
    /// breakpoint was just removed.
    pub fn files(&self) -> Vec<PathBuf> {
        self.by_file.keys().cloned().collect()
    }

    /// Build the `setBreakpoints` arguments for `path`.
    pub fn request_for_file(&self, path: &Path) -> SetBreakpointsArguments {
        SetBreakpointsArguments {
            source: Source {
                name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                path: Some(path.to_string_lossy().into_owned()),
            },
            breakpoints: self
                .get_for_file(path)
                .iter()
                .map(|bp| SourceBreakpoint {
                    line: bp.line,
                    condition: bp.condition.clone(),
                })
                .collect(),
        }
    }

    /// Apply a `setBreakpoints` response. The adapter answers in request
    /// order; the entry is dropped once the file holds no breakpoints.
    pub fn apply_response(&mut self, path: &Path, responses: &[BreakpointResponse]) {
        let Some(list) = self.by_file.get_mut(path) else {
            return;
        };
        for (bp, resp) in list.iter_mut().zip(responses) {
            bp.verified = resp.verified;
            bp.adapter_id = resp.id;
            if let Some(line) = resp.line {
                bp.line = line;
            }
        }
        if list.is_empty() {
            self.by_file.remove(path);
        }
    }

    /// Apply a `breakpoint` event. Returns the updated breakpoint, if known.
    pub fn apply_event(&mut self, resp: &BreakpointResponse) -> Option<&Breakpoint> {
        let adapter_id = resp.id?;
        let bp = self
            .by_file
            .values_mut()
            .flat_map(|v| v.iter_mut())
            .find(|bp| bp.adapter_id == Some(adapter_id))?;
        bp.verified = resp.verified;
        if let Some(line) = resp.line {
            bp.line = line;
        }
        Some(bp)
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_path(name: &str) -> PathBuf {
        PathBuf::from(format!("/src/{name}"))
    }

    fn verified(id: i64, line: i64) -> BreakpointResponse {
        BreakpointResponse {
            id: Some(id),
            verified: true,
            message: None,
            source: None,
            line: Some(line),
        }
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let mut mgr = BreakpointManager::new();
        assert_eq!(mgr.add(test_path("a.py"), 1, None), 1);
        assert_eq!(mgr.add(test_path("b.py"), 2, None), 2);
        assert_eq!(mgr.add(test_path("a.py"), 9, None), 3);
        let ids: Vec<u32> = mgr.sorted().iter().map(|bp| bp.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn re_adding_location_updates_condition() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.py");
        let id = mgr.add(path.clone(), 10, None);
        assert_eq!(mgr.add(path.clone(), 10, Some("x > 1".into())), id);
        assert_eq!(mgr.get_for_file(&path).len(), 1);
        assert_eq!(mgr.get(id).unwrap().location(), "/src/main.py:10 if x > 1");
    }

    #[test]
    fn set_and_verify() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("main.py");
        mgr.add(path.clone(), 10, None);
        mgr.add(path.clone(), 20, None);

        let args = mgr.request_for_file(&path);
        assert_eq!(args.source.name.as_deref(), Some("main.py"));
        assert_eq!(args.breakpoints.len(), 2);
        assert_eq!(args.breakpoints[1].line, 20);

        mgr.apply_response(&path, &[verified(7, 10), verified(8, 21)]);
        let bps = mgr.get_for_file(&path);
        assert!(bps.iter().all(|bp| bp.verified));
        assert_eq!(bps[1].line, 21);
        assert_eq!(bps[0].adapter_id, Some(7));
    }

    #[test]
    fn remove_keeps_file_until_synced() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("single.py");
        let id = mgr.add(path.clone(), 1, None);

        assert_eq!(mgr.remove(id).unwrap().line, 1);
        assert!(mgr.remove(id).is_none());
        assert_eq!(mgr.files(), vec![path.clone()]);
        assert!(mgr.request_for_file(&path).breakpoints.is_empty());

        mgr.apply_response(&path, &[]);
        assert!(mgr.files().is_empty());
    }

    #[test]
    fn event_updates_by_adapter_id() {
        let mut mgr = BreakpointManager::new();
        let path = test_path("app.js");
        mgr.add(path.clone(), 4, None);
        mgr.apply_response(
            &path,
            &[BreakpointResponse {
                id: Some(3),
                verified: false,
                message: Some("pending".into()),
                source: None,
                line: None,
            }],
        );

        let updated = mgr.apply_event(&verified(3, 5)).unwrap();
        assert!(updated.verified);
        assert_eq!(updated.line, 5);
        assert!(mgr.apply_event(&verified(99, 1)).is_none());
    }
}
