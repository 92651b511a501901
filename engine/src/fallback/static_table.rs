//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::strings::StringTable;
use dealer_common::DialogueCategory;
use std::collections::HashMap;
use tracing::debug;

/// Last-resort lines per category, ordered by rising pressure
#[derive(Debug, Default)]
pub struct StaticDialogueTable {
    entries: HashMap<DialogueCategory, Vec<String>>,
    defaults: HashMap<DialogueCategory, String>,
    fallback: String,
}

impl StaticDialogueTable {
    pub fn new(strings: &dyn StringTable) -> Self {
        let mut table = Self::default();
        table.reload(strings);
        table
    }

    pub fn reload(&mut self, strings: &dyn StringTable) {
        self.entries.clear();
        self.defaults.clear();
        for category in DialogueCategory::ALL {
            let lines = strings.get_array(&format!("static_db.{}", category.as_key()));
            if !lines.is_empty() {
                self.entries.insert(category, lines);
            }
            if let Some(line) = strings.get(&format!("fallback.category_default_{}", category.as_key())) {
                self.defaults.insert(category, line);
            }
        }
        self.fallback = strings.get_or("static_db.fallback", "...");
        debug!("Static dialogue table loaded for {} categories", self.entries.len());
    }

    /// Line at `clamp(floor(pressure * 1.5), 0, len - 1)`. Never empty.
    pub fn get(&self, category: DialogueCategory, pressure: f32) -> String {
        if let Some(options) = self.entries.get(&category).filter(|o| !o.is_empty()) {
            let index = ((pressure * 1.5).floor().max(0.0) as usize).min(options.len() - 1);
            return options[index].clone();
        }

        match self.defaults.get(&category) {
            Some(line) => line.clone(),
            None if self.fallback.is_empty() => "...".to_string(),
            None => self.fallback.clone(),
        }
    }
}
