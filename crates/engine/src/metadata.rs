//! Per-row and per-column metadata, stored as runs.
//!
//! Length (row height or column width) and visibility are kept as a sorted
//! list of non-overlapping runs. Indices with default metadata are never
//! stored, so a sheet with two billion rows and one resized row holds one
//! run. The two attributes are independent: clearing a length leaves the
//! hidden flag alone and vice versa.

use serde::{Deserialize, Serialize};

/// Metadata for one index. `length: None` means the axis default applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthInfo {
    pub length: Option<u32>,
    pub hidden: bool,
}

impl LengthInfo {
    fn is_default(self) -> bool {
        self == LengthInfo::default()
    }
}

/// A maximal run of indices sharing the same metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRun {
    pub start: u32,
    pub count: u32,
    pub info: LengthInfo,
}

/// Run-encoded metadata for one axis, bounded by that axis's index limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStore {
    limit: u32,
    /// Sorted, non-overlapping, non-default, maximal runs.
    runs: Vec<MetaRun>,
}

impl MetadataStore {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            runs: Vec::new(),
        }
    }

    pub fn set_length(&mut self, start: u32, count: u32, length: u32) {
        self.update(start, count, |info| info.length = Some(length));
    }

    pub fn clear_length(&mut self, start: u32, count: u32) {
        self.update(start, count, |info| info.length = None);
    }

    pub fn set_hidden(&mut self, start: u32, count: u32, hidden: bool) {
        self.update(start, count, |info| info.hidden = hidden);
    }

    pub fn get_info(&self, index: u32) -> LengthInfo {
        self.runs
            .iter()
            .find(|r| index >= r.start && (u64::from(index)) < r.end())
            .map(|r| r.info)
            .unwrap_or_default()
    }

    /// The runs covering `[start, start + count)`, clipped to that window
    /// and with default-metadata gaps filled in. Consecutive equal runs are
    /// reported as one.
    pub fn ranges(&self, start: u32, count: u32) -> Vec<MetaRun> {
        let end = u64::from(start) + u64::from(count);
        let mut out: Vec<MetaRun> = Vec::new();
        let mut cursor = u64::from(start);

        for run in &self.runs {
            if run.end() <= u64::from(start) {
                continue;
            }
            if u64::from(run.start) >= end {
                break;
            }
            let run_start = u64::from(run.start).max(u64::from(start));
            let run_end = run.end().min(end);
            if run_start > cursor {
                push_run(&mut out, cursor, run_start - cursor, LengthInfo::default());
            }
            push_run(&mut out, run_start, run_end - run_start, run.info);
            cursor = run_end;
        }
        if cursor < end {
            push_run(&mut out, cursor, end - cursor, LengthInfo::default());
        }
        out
    }

    /// Make room for `count` new default-metadata indices at `start`.
    /// Runs at or after `start` shift up; a run straddling `start` is
    /// split. Runs pushed past the axis limit are clipped away.
    pub fn insert_indices(&mut self, start: u32, count: u32) {
        let mut shifted: Vec<MetaRun> = Vec::new();
        for run in self.runs.drain(..) {
            if run.end() <= u64::from(start) {
                shifted.push(run);
                continue;
            }
            let (head, tail) = run.split_at(start);
            if let Some(head) = head {
                shifted.push(head);
            }
            let new_start = u64::from(tail.start) + u64::from(count);
            let new_end = (new_start + u64::from(tail.count)).min(u64::from(self.limit));
            if new_start < new_end {
                shifted.push(MetaRun {
                    start: new_start as u32,
                    count: (new_end - new_start) as u32,
                    info: tail.info,
                });
            }
        }
        self.runs = shifted;
        self.coalesce();
    }

    /// Drop the metadata of `[start, start + count)` and shift everything
    /// after it down.
    pub fn erase_indices(&mut self, start: u32, count: u32) {
        let band_end = u64::from(start) + u64::from(count);
        let mut kept: Vec<MetaRun> = Vec::new();
        for run in self.runs.drain(..) {
            if run.end() <= u64::from(start) {
                kept.push(run);
                continue;
            }
            if let (Some(head), _) = run.split_at(start) {
                kept.push(head);
            }
            let tail_start = u64::from(run.start).max(band_end);
            if tail_start < run.end() {
                kept.push(MetaRun {
                    start: (tail_start - u64::from(count)) as u32,
                    count: (run.end() - tail_start) as u32,
                    info: run.info,
                });
            }
        }
        self.runs = kept;
        self.coalesce();
    }

    /// Apply `f` to the metadata of every index in `[start, start + count)`.
    fn update(&mut self, start: u32, count: u32, f: impl Fn(&mut LengthInfo)) {
        if count == 0 {
            return;
        }
        let band_end = u64::from(start) + u64::from(count);
        let mut next: Vec<MetaRun> = Vec::new();
        let mut cursor = u64::from(start);

        for run in self.runs.drain(..) {
            if run.end() <= u64::from(start) || u64::from(run.start) >= band_end {
                next.push(run);
                continue;
            }
            // leading part outside the band
            if u64::from(run.start) < u64::from(start) {
                next.push(MetaRun {
                    start: run.start,
                    count: start - run.start,
                    info: run.info,
                });
            }
            // default gap before this run, inside the band
            let overlap_start = u64::from(run.start).max(u64::from(start));
            if overlap_start > cursor {
                let mut info = LengthInfo::default();
                f(&mut info);
                next.push(MetaRun {
                    start: cursor as u32,
                    count: (overlap_start - cursor) as u32,
                    info,
                });
            }
            // the overlapping part itself
            let overlap_end = run.end().min(band_end);
            let mut info = run.info;
            f(&mut info);
            next.push(MetaRun {
                start: overlap_start as u32,
                count: (overlap_end - overlap_start) as u32,
                info,
            });
            cursor = overlap_end;
            // trailing part outside the band
            if run.end() > band_end {
                next.push(MetaRun {
                    start: band_end as u32,
                    count: (run.end() - band_end) as u32,
                    info: run.info,
                });
            }
        }
        if cursor < band_end {
            let mut info = LengthInfo::default();
            f(&mut info);
            next.push(MetaRun {
                start: cursor as u32,
                count: (band_end - cursor) as u32,
                info,
            });
        }
        self.runs = next;
        self.coalesce();
    }

    /// Restore the invariants: sorted, non-default, maximal runs.
    fn coalesce(&mut self) {
        self.runs.retain(|r| !r.info.is_default() && r.count > 0);
        self.runs.sort_by_key(|r| r.start);
        let mut merged: Vec<MetaRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.info == run.info && prev.end() == u64::from(run.start) => {
                    prev.count += run.count;
                }
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

impl MetaRun {
    fn end(self) -> u64 {
        u64::from(self.start) + u64::from(self.count)
    }

    /// Split into the part before `at` and the part from `at` on. The
    /// second half is the whole run when `at <= start`.
    fn split_at(self, at: u32) -> (Option<MetaRun>, MetaRun) {
        if at <= self.start {
            (None, self)
        } else {
            debug_assert!(u64::from(at) < self.end());
            let head = MetaRun {
                start: self.start,
                count: at - self.start,
                info: self.info,
            };
            let tail = MetaRun {
                start: at,
                count: (self.end() - u64::from(at)) as u32,
                info: self.info,
            };
            (Some(head), tail)
        }
    }
}

fn push_run(out: &mut Vec<MetaRun>, start: u64, count: u64, info: LengthInfo) {
    if count == 0 {
        return;
    }
    if let Some(prev) = out.last_mut() {
        if prev.info == info && prev.end() == start {
            prev.count += count as u32;
            return;
        }
    }
    out.push(MetaRun {
        start: start as u32,
        count: count as u32,
        info,
    });
}
