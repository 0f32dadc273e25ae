// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process-wide typed name -> kind directory. Enforces uniqueness of names
//! across entity kinds that share the namespace (TCs, modules, ports), per
//! spec invariant I1.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Tc,
    Module,
    Port,
}

#[derive(Default)]
pub struct Namespace {
    names: HashMap<String, NameKind>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-empty, ASCII, restricted to identifier characters. Case-sensitive.
    pub fn is_valid_name(name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut chars = name.chars();
        let first = chars.next().unwrap();
        if !(first.is_ascii_alphabetic() || first == '_') {
            return false;
        }
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':')
    }

    pub fn exists(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<NameKind> {
        self.names.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, kind: NameKind) {
        self.names.insert(name.to_string(), kind);
    }

    pub fn remove(&mut self, name: &str) {
        self.names.remove(name);
    }

    /// Stable snapshot of all names of `kind`, for the duration of the
    /// returned vector. Not ordered.
    pub fn iter(&self, kind: NameKind) -> Vec<String> {
        self.names
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_malformed_names() {
        assert!(!Namespace::is_valid_name(""));
        assert!(!Namespace::is_valid_name("1leading_digit"));
        assert!(!Namespace::is_valid_name("has space"));
        assert!(Namespace::is_valid_name("bulk"));
        assert!(Namespace::is_valid_name("_tc.0"));
    }

    #[test]
    fn uniqueness_spans_kinds() {
        let mut ns = Namespace::new();
        ns.insert("shared", NameKind::Tc);
        assert!(ns.exists("shared"));
        assert_eq!(ns.kind_of("shared"), Some(NameKind::Tc));

        ns.remove("shared");
        assert!(!ns.exists("shared"));
    }

    #[test]
    fn iteration_is_a_stable_snapshot() {
        let mut ns = Namespace::new();
        ns.insert("a", NameKind::Module);
        ns.insert("b", NameKind::Module);
        ns.insert("c", NameKind::Port);

        let mut modules = ns.iter(NameKind::Module);
        modules.sort();
        assert_eq!(modules, vec!["a".to_string(), "b".to_string()]);
    }
}
