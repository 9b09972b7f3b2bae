use std::path::PathBuf;

use crate::SessionError;

const WORKBOOK_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// A workbook the user picked, before it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            path: path.into(),
        }
    }

    fn dedupe_key(&self) -> (&str, u64) {
        (&self.name, self.size)
    }
}

/// True when `name` ends in `.xlsx` or `.xls`, ignoring ASCII case.
pub fn is_workbook_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    WORKBOOK_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddSourcesOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Template plus ordered source list; sources are unique by `(name, size)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StagedInputs {
    template: Option<FileHandle>,
    sources: Vec<FileHandle>,
}

impl StagedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(&self) -> Option<&FileHandle> {
        self.template.as_ref()
    }

    pub fn sources(&self) -> &[FileHandle] {
        &self.sources
    }

    /// Replaces the template. A non-workbook name leaves the current template untouched.
    pub fn set_template(&mut self, file: FileHandle) -> Result<(), SessionError> {
        if !is_workbook_name(&file.name) {
            return Err(SessionError::Validation(format!(
                "{} is not an Excel file (.xlsx or .xls)",
                file.name
            )));
        }
        self.template = Some(file);
        Ok(())
    }

    pub fn clear_template(&mut self) {
        self.template = None;
    }

    pub fn add_sources(&mut self, files: Vec<FileHandle>) -> AddSourcesOutcome {
        let mut outcome = AddSourcesOutcome::default();
        for file in files {
            if !is_workbook_name(&file.name) {
                outcome.rejected += 1;
                continue;
            }
            let duplicate = self
                .sources
                .iter()
                .any(|staged| staged.dedupe_key() == file.dedupe_key());
            if duplicate {
                outcome.duplicates += 1;
            } else {
                self.sources.push(file);
                outcome.added += 1;
            }
        }
        outcome
    }

    /// Removes the source at `index`; out of range does nothing.
    pub fn remove_source(&mut self, index: usize) -> Option<FileHandle> {
        if index < self.sources.len() {
            Some(self.sources.remove(index))
        } else {
            None
        }
    }

    pub fn can_submit(&self) -> bool {
        self.template.is_some() && !self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.template = None;
        self.sources.clear();
    }
}
