//! Collision-safe output naming.
//!
//! Every item writes two files into the flat output directory: the Stage-1
//! intermediate and the Stage-2 final. Two sources named `a.ofd` in
//! different subdirectories would otherwise race for `a.pdf` and `a.docx`.
//!
//! [`NameRegistry::reserve`] hands out `a`, `a_1`, `a_2`, … in the order
//! reservations are made. The check-and-insert is one critical section, and
//! the intermediate name reuses the final name's ordinal, so no two items of
//! one batch ever share either path.
//!
//! The registry only knows about names claimed in this process. An output
//! left behind by an earlier run is handled by the pipeline's skip check,
//! not here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// An exclusively claimed output name pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameReservation {
    /// Final output file name, e.g. `report_1.docx`.
    pub final_name: String,
    /// Intermediate file name with the same ordinal, e.g. `report_1.pdf`.
    pub intermediate_name: String,
    /// 0 means no suffix.
    pub ordinal: usize,
}

impl NameReservation {
    pub fn final_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.final_name)
    }

    pub fn intermediate_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.intermediate_name)
    }
}

/// Shared set of final names already handed out in this batch.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: Mutex<HashSet<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free `base[_N]` for `final_ext`.
    ///
    /// Extensions include the dot (`.docx`, `.pdf`).
    pub fn reserve(&self, base_name: &str, final_ext: &str, intermediate_ext: &str) -> NameReservation {
        let (final_name, ordinal) = {
            // A poisoned lock only means another reservation panicked; the set
            // itself is still consistent because insert is the last step.
            let mut taken = self.taken.lock().unwrap_or_else(|e| e.into_inner());
            let mut ordinal = 0usize;
            loop {
                let candidate = format!("{}{}", suffixed(base_name, ordinal), final_ext);
                // Case-insensitive file systems treat `A.docx` and `a.docx` as one file.
                if taken.insert(candidate.to_lowercase()) {
                    break (candidate, ordinal);
                }
                ordinal += 1;
            }
        };

        let intermediate_name = format!("{}{}", suffixed(base_name, ordinal), intermediate_ext);
        debug!("Reserved {} / {} (ordinal {})", final_name, intermediate_name, ordinal);

        NameReservation {
            final_name,
            intermediate_name,
            ordinal,
        }
    }

    /// Number of names handed out so far.
    pub fn len(&self) -> usize {
        self.taken.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn suffixed(base_name: &str, ordinal: usize) -> String {
    if ordinal == 0 {
        base_name.to_string()
    } else {
        format!("{base_name}_{ordinal}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn distinct_names_get_ordinal_zero() {
        let reg = NameRegistry::new();
        let names = ["alpha", "beta", "gamma", "delta"];
        let res: Vec<_> = names.iter().map(|n| reg.reserve(n, ".docx", ".pdf")).collect();

        for (r, n) in res.iter().zip(names) {
            assert_eq!(r.ordinal, 0);
            assert_eq!(r.final_name, format!("{n}.docx"));
            assert_eq!(r.intermediate_name, format!("{n}.pdf"));
        }
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn duplicates_get_sequential_ordinals() {
        let reg = NameRegistry::new();
        let res: Vec<_> = (0..4).map(|_| reg.reserve("a", ".docx", ".pdf")).collect();

        let finals: Vec<&str> = res.iter().map(|r| r.final_name.as_str()).collect();
        assert_eq!(finals, ["a.docx", "a_1.docx", "a_2.docx", "a_3.docx"]);
        let intermediates: Vec<&str> = res.iter().map(|r| r.intermediate_name.as_str()).collect();
        assert_eq!(intermediates, ["a.pdf", "a_1.pdf", "a_2.pdf", "a_3.pdf"]);
        let ordinals: Vec<usize> = res.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, [0, 1, 2, 3]);
    }

    #[test]
    fn suffixed_name_colliding_with_real_name_is_skipped() {
        // A source literally named "a_1" claims a_1.docx first; the second
        // "a" must then skip to a_2.
        let reg = NameRegistry::new();
        assert_eq!(reg.reserve("a", ".docx", ".pdf").final_name, "a.docx");
        assert_eq!(reg.reserve("a_1", ".docx", ".pdf").final_name, "a_1.docx");
        let third = reg.reserve("a", ".docx", ".pdf");
        assert_eq!(third.final_name, "a_2.docx");
        assert_eq!(third.intermediate_name, "a_2.pdf");
    }

    #[test]
    fn names_differing_only_in_case_collide() {
        let reg = NameRegistry::new();
        assert_eq!(reg.reserve("Report", ".docx", ".pdf").final_name, "Report.docx");
        let second = reg.reserve("report", ".docx", ".pdf");
        assert_eq!(second.final_name, "report_1.docx");
        assert_eq!(second.intermediate_name, "report_1.pdf");
    }

    #[test]
    fn concurrent_reservations_never_collide() {
        let reg = Arc::new(NameRegistry::new());
        let threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| reg.reserve("same", ".docx", ".pdf"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ordinals: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|r| {
                assert_eq!(r.final_name, suffixed("same", r.ordinal) + ".docx");
                r.ordinal
            })
            .collect();
        ordinals.sort_unstable();

        let expected: Vec<usize> = (0..threads * per_thread).collect();
        assert_eq!(ordinals, expected);
    }

    #[test]
    fn paths_join_output_dir() {
        let reg = NameRegistry::new();
        let r = reg.reserve("doc", ".txt", ".pdf");
        let out = Path::new("/tmp/out");
        assert_eq!(r.final_path(out), PathBuf::from("/tmp/out/doc.txt"));
        assert_eq!(r.intermediate_path(out), PathBuf::from("/tmp/out/doc.pdf"));
    }
}
