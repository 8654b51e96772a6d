// Reconciliation report module
// Classification of two folder trees plus plain-text and JSON renderings

use serde::Serialize;
use std::path::PathBuf;

use crate::catalog::FileRecord;

/// Same filename on both sides with content that same-name hash pairing
/// could not fully explain. `a_side`/`b_side` hold only the leftover records
/// after every hash-identical pair for this name has been paired off.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictGroup {
    pub name: String,
    pub a_side: Vec<FileRecord>,
    pub b_side: Vec<FileRecord>,
    /// Pairs for this name that did match exactly
    pub matched_pairs: usize,
}

/// Same content hash appearing under different filenames on the two sides,
/// beyond what same-name pairing already accounted for. Surfaced as a hint;
/// never auto-resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SuspectedRename {
    pub content_hash: String,
    pub a_names: Vec<String>,
    pub b_names: Vec<String>,
    pub pair_count: usize,
}

/// Full classification of two folder trees
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub folder_a: PathBuf,
    pub folder_b: PathBuf,
    /// Records whose filename has no match on the other side, ordered
    pub only_in_a: Vec<FileRecord>,
    pub only_in_b: Vec<FileRecord>,
    /// Count of filename+hash pairs present on both sides (no action needed)
    pub exact_matches: usize,
    pub conflicts: Vec<ConflictGroup>,
    pub suspected_renames: Vec<SuspectedRename>,
    /// Bytes that must land on side A to receive B's unique files
    pub space_needed_a: u64,
    /// Bytes that must land on side B to receive A's unique files
    pub space_needed_b: u64,
    /// True when the run was cancelled and the classification is partial
    pub incomplete: bool,
}

impl ReconciliationResult {
    pub fn empty(folder_a: PathBuf, folder_b: PathBuf) -> Self {
        Self {
            folder_a,
            folder_b,
            only_in_a: Vec::new(),
            only_in_b: Vec::new(),
            exact_matches: 0,
            conflicts: Vec::new(),
            suspected_renames: Vec::new(),
            space_needed_a: 0,
            space_needed_b: 0,
            incomplete: false,
        }
    }

    /// Records on either side that need a copy or a policy decision
    pub fn needs_sync_count(&self) -> usize {
        let conflict_records: usize = self
            .conflicts
            .iter()
            .map(|c| c.a_side.len() + c.b_side.len())
            .sum();
        self.only_in_a.len() + self.only_in_b.len() + conflict_records
    }

    /// True when both trees already hold the same content
    pub fn is_synchronized(&self) -> bool {
        self.only_in_a.is_empty() && self.only_in_b.is_empty() && self.conflicts.is_empty()
    }

    /// Print the report to stdout
    pub fn display(&self) {
        print!("{}", self.to_plain_text());
    }

    /// Format the report as plain text
    pub fn to_plain_text(&self) -> String {
        let mut output = String::new();

        output.push_str("\n=== Folder Reconciliation Report ===\n\n");
        if self.incomplete {
            output.push_str("(cancelled - partial results)\n\n");
        }

        output.push_str("Summary:\n");
        output.push_str(&format!("  Folder A: {}\n", self.folder_a.display()));
        output.push_str(&format!("  Folder B: {}\n", self.folder_b.display()));
        output.push_str(&format!("  Exact matches:     {}\n", self.exact_matches));
        output.push_str(&format!("  Only in A:         {}\n", self.only_in_a.len()));
        output.push_str(&format!("  Only in B:         {}\n", self.only_in_b.len()));
        output.push_str(&format!("  Conflict groups:   {}\n", self.conflicts.len()));
        output.push_str(&format!("  Suspected renames: {}\n", self.suspected_renames.len()));
        output.push_str(&format!("  Space needed on A: {} bytes\n", self.space_needed_a));
        output.push_str(&format!("  Space needed on B: {} bytes\n", self.space_needed_b));

        if !self.only_in_a.is_empty() {
            output.push_str("\nOnly in A (missing from B):\n");
            for record in &self.only_in_a {
                output.push_str(&format!("  {} ({} bytes)\n", record.path.display(), record.size));
            }
        }

        if !self.only_in_b.is_empty() {
            output.push_str("\nOnly in B (missing from A):\n");
            for record in &self.only_in_b {
                output.push_str(&format!("  {} ({} bytes)\n", record.path.display(), record.size));
            }
        }

        if !self.conflicts.is_empty() {
            output.push_str("\nConflicts (same name, different content):\n");
            for group in &self.conflicts {
                output.push_str(&format!("  {}\n", group.name));
                for record in &group.a_side {
                    output.push_str(&format!(
                        "    A: {} MD5: {}\n",
                        record.path.display(),
                        record.content_hash
                    ));
                }
                for record in &group.b_side {
                    output.push_str(&format!(
                        "    B: {} MD5: {}\n",
                        record.path.display(),
                        record.content_hash
                    ));
                }
            }
        }

        if !self.suspected_renames.is_empty() {
            output.push_str("\nSuspected renames (same content, different names):\n");
            for rename in &self.suspected_renames {
                output.push_str(&format!(
                    "  MD5 {} | A: {} | B: {} ({} pairs)\n",
                    rename.content_hash,
                    rename.a_names.join(", "),
                    rename.b_names.join(", "),
                    rename.pair_count
                ));
            }
        }

        output.push('\n');
        output
    }

    /// Format the report as a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            metadata: Metadata,
            summary: Summary,
            #[serde(flatten)]
            result: &'a ReconciliationResult,
        }

        #[derive(Serialize)]
        struct Metadata {
            timestamp: String,
        }

        #[derive(Serialize)]
        struct Summary {
            exact_matches: usize,
            only_in_a: usize,
            only_in_b: usize,
            conflict_groups: usize,
            suspected_renames: usize,
            needs_sync: usize,
        }

        let output = JsonOutput {
            metadata: Metadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            summary: Summary {
                exact_matches: self.exact_matches,
                only_in_a: self.only_in_a.len(),
                only_in_b: self.only_in_b.len(),
                conflict_groups: self.conflicts.len(),
                suspected_renames: self.suspected_renames.len(),
                needs_sync: self.needs_sync_count(),
            },
            result: self,
        };

        serde_json::to_string_pretty(&output)
    }
}
