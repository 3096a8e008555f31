use std::collections::HashMap;
use unicode_width::UnicodeWidthStr;

/// string interner for repeated column values (hosts, subsystems)
///
/// rows store small integer codes instead of owned strings, so the per-row
/// arrays stay compact even for the full line count of a long-running job's
/// log. codes are assigned in first-seen order (0, 1, ...) and stay stable
/// until [`ColumnRegistry::clear`].
pub struct ColumnRegistry {
    values: Vec<String>,
    codes: HashMap<String, u32>,
    max_width: usize,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            codes: HashMap::new(),
            max_width: 0,
        }
    }

    /// return the code for `value`, assigning the next sequential code on
    /// first sight. also folds the value's display width into the tracked
    /// column maximum.
    pub fn code_for(&mut self, value: &str) -> u32 {
        if let Some(&code) = self.codes.get(value) {
            return code;
        }

        let code = self.values.len() as u32;
        self.values.push(value.to_string());
        self.codes.insert(value.to_string(), code);
        self.max_width = self.max_width.max(value.width());
        code
    }

    /// code back to value; codes not produced by this registry resolve to "?"
    pub fn resolve(&self, code: u32) -> &str {
        self.values.get(code as usize).map_or("?", |s| s.as_str())
    }

    /// maximum display width over all interned values
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.codes.clear();
        self.max_width = 0;
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::new()
    }
}
