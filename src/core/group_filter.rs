//! Group-filter engine
//!
//! Filter expressions enable or disable dependency groups, optionally scoped
//! to a single workspace path:
//!
//! ```text
//! filter := ('+' | '-') identifier ('@' path)?
//! ```
//!
//! Filters are evaluated in order with last-match-wins semantics per group.
//! The effective list is built from three layers: the main manifest's
//! `group-filters`, filters inherited from ancestor `with-groups`
//! declarations, and command-line filters (highest precedence).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-])([A-Za-z_][A-Za-z0-9_-]*)(?:@(.+))?$")
        .expect("filter regex must compile")
});

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid group filter '{expr}' (expected '+group', '-group', or '+group@path')")]
    BadExpression { expr: String },
}

/// Where a filter rule came from, for `info dep-tree` traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// The main manifest's `group-filters` list.
    Manifest,
    /// A `with-groups` declaration at an ancestor dependency site.
    Inherited,
    /// `--group-filter` on the command line, or the filters stored at init.
    CommandLine,
}

impl fmt::Display for FilterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSource::Manifest => write!(f, "manifest"),
            FilterSource::Inherited => write!(f, "inherited"),
            FilterSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// A single parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFilter {
    /// true for `+`, false for `-`.
    pub select: bool,
    pub group: String,
    /// Path qualifier; the rule only matches projects at this exact path.
    pub path: Option<String>,
}

impl GroupFilter {
    pub fn parse(expr: &str) -> Result<GroupFilter, FilterError> {
        let caps = FILTER_RE.captures(expr).ok_or_else(|| FilterError::BadExpression {
            expr: expr.to_string(),
        })?;
        Ok(GroupFilter {
            select: &caps[1] == "+",
            group: caps[2].to_string(),
            path: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    fn matches(&self, groups: &[String], path: &str) -> bool {
        if let Some(ref p) = self.path {
            if p != path {
                return false;
            }
        }
        groups.iter().any(|g| g == &self.group)
    }
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.select { '+' } else { '-' }, self.group)?;
        if let Some(ref p) = self.path {
            write!(f, "@{}", p)?;
        }
        Ok(())
    }
}

/// A filter together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub filter: GroupFilter,
    pub source: FilterSource,
}

/// Outcome of evaluating the filter list against one project.
#[derive(Debug, Clone)]
pub struct Selection {
    pub selected: bool,
    /// The rule that decided the outcome, if any rule matched.
    pub winning: Option<FilterRule>,
}

impl Selection {
    fn unconditional() -> Selection {
        Selection {
            selected: true,
            winning: None,
        }
    }
}

/// The ordered, layered filter list for one resolver run.
///
/// Layers are evaluated in order manifest → inherited → command line, so a
/// later layer's match overrides an earlier layer's for the same group.
#[derive(Debug, Clone, Default)]
pub struct GroupFilters {
    manifest: Vec<GroupFilter>,
    inherited: Vec<GroupFilter>,
    command_line: Vec<GroupFilter>,
}

impl GroupFilters {
    pub fn new() -> GroupFilters {
        GroupFilters::default()
    }

    pub fn set_manifest(&mut self, exprs: &[String]) -> Result<(), FilterError> {
        self.manifest = parse_all(exprs)?;
        Ok(())
    }

    pub fn set_command_line(&mut self, exprs: &[String]) -> Result<(), FilterError> {
        self.command_line = parse_all(exprs)?;
        Ok(())
    }

    /// Derive the filter list seen by a dependency's subtree: the parent's
    /// list plus `+group` rules for each of the dependency's `with-groups`.
    pub fn with_inherited(&self, with_groups: &[String]) -> GroupFilters {
        let mut child = self.clone();
        for group in with_groups {
            child.inherited.push(GroupFilter {
                select: true,
                group: group.clone(),
                path: None,
            });
        }
        child
    }

    /// Decide whether a project (or file ref) with the given groups at the
    /// given workspace path is selected.
    ///
    /// The main project is always selected; so is anything without groups.
    /// Otherwise the project is selected iff at least one of its groups has
    /// a `+` rule as its last match. Filters naming unknown groups are
    /// legal no-ops.
    pub fn is_selected(&self, groups: &[String], path: &str, is_main: bool) -> Selection {
        if is_main || groups.is_empty() {
            return Selection::unconditional();
        }

        let layers = [
            (FilterSource::Manifest, &self.manifest),
            (FilterSource::Inherited, &self.inherited),
            (FilterSource::CommandLine, &self.command_line),
        ];

        let mut winner: Option<FilterRule> = None;
        for group in groups {
            let single = std::slice::from_ref(group);
            let mut group_winner: Option<FilterRule> = None;
            for (source, rules) in &layers {
                for rule in rules.iter() {
                    if rule.matches(single, path) {
                        group_winner = Some(FilterRule {
                            filter: rule.clone(),
                            source: *source,
                        });
                    }
                }
            }
            if let Some(rule) = group_winner {
                if rule.filter.select {
                    return Selection {
                        selected: true,
                        winning: Some(rule),
                    };
                }
                winner = Some(rule);
            }
        }

        Selection {
            selected: false,
            winning: winner,
        }
    }

    /// Flatten every layer into expression strings, in evaluation order.
    /// Used by the `resolve` transform to emit a self-contained manifest.
    pub fn flattened(&self) -> Vec<String> {
        self.manifest
            .iter()
            .chain(&self.inherited)
            .chain(&self.command_line)
            .map(|f| f.to_string())
            .collect()
    }
}

fn parse_all(exprs: &[String]) -> Result<Vec<GroupFilter>, FilterError> {
    exprs.iter().map(|e| GroupFilter::parse(e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(manifest: &[&str], cmdline: &[&str]) -> GroupFilters {
        let mut f = GroupFilters::new();
        f.set_manifest(&to_vec(manifest)).unwrap();
        f.set_command_line(&to_vec(cmdline)).unwrap();
        f
    }

    fn to_vec(exprs: &[&str]) -> Vec<String> {
        exprs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_plain() {
        let f = GroupFilter::parse("+dev").unwrap();
        assert!(f.select);
        assert_eq!(f.group, "dev");
        assert!(f.path.is_none());
    }

    #[test]
    fn test_parse_path_qualified() {
        let f = GroupFilter::parse("-doc@tools/docs").unwrap();
        assert!(!f.select);
        assert_eq!(f.group, "doc");
        assert_eq!(f.path.as_deref(), Some("tools/docs"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(GroupFilter::parse("dev").is_err());
        assert!(GroupFilter::parse("+1bad").is_err());
        assert!(GroupFilter::parse("").is_err());
    }

    #[test]
    fn test_main_always_selected() {
        let f = filters(&["-dev"], &[]);
        assert!(f.is_selected(&to_vec(&["dev"]), "main", true).selected);
    }

    #[test]
    fn test_empty_groups_always_selected() {
        let f = filters(&["-dev"], &[]);
        assert!(f.is_selected(&[], "lib", false).selected);
    }

    #[test]
    fn test_groups_deselected_by_default() {
        let f = filters(&[], &[]);
        assert!(!f.is_selected(&to_vec(&["dev"]), "lib", false).selected);
    }

    #[test]
    fn test_plus_selects() {
        let f = filters(&[], &["+dev"]);
        let sel = f.is_selected(&to_vec(&["dev"]), "lib", false);
        assert!(sel.selected);
        assert_eq!(sel.winning.unwrap().source, FilterSource::CommandLine);
    }

    #[test]
    fn test_last_match_wins_within_list() {
        let f = filters(&["+dev", "-dev"], &[]);
        assert!(!f.is_selected(&to_vec(&["dev"]), "lib", false).selected);

        let f = filters(&["-dev", "+dev"], &[]);
        assert!(f.is_selected(&to_vec(&["dev"]), "lib", false).selected);
    }

    #[test]
    fn test_command_line_overrides_manifest() {
        let f = filters(&["-dev"], &["+dev"]);
        assert!(f.is_selected(&to_vec(&["dev"]), "lib", false).selected);
    }

    #[test]
    fn test_path_qualifier_scopes_rule() {
        let f = filters(&["+dev@libs/a"], &[]);
        assert!(f.is_selected(&to_vec(&["dev"]), "libs/a", false).selected);
        assert!(!f.is_selected(&to_vec(&["dev"]), "libs/b", false).selected);
    }

    #[test]
    fn test_any_selected_group_wins() {
        // One group negatively matched, another positively: selected.
        let f = filters(&["+dev", "-doc"], &[]);
        let sel = f.is_selected(&to_vec(&["doc", "dev"]), "lib", false);
        assert!(sel.selected);
        assert_eq!(sel.winning.unwrap().filter.group, "dev");
    }

    #[test]
    fn test_inherited_layer() {
        let base = filters(&[], &[]);
        let child = base.with_inherited(&to_vec(&["test"]));
        let sel = child.is_selected(&to_vec(&["test"]), "lib/ut", false);
        assert!(sel.selected);
        assert_eq!(sel.winning.unwrap().source, FilterSource::Inherited);

        // Command line still overrides inherited.
        let mut loud = child.clone();
        loud.set_command_line(&to_vec(&["-test"])).unwrap();
        assert!(!loud.is_selected(&to_vec(&["test"]), "lib/ut", false).selected);
    }

    #[test]
    fn test_unknown_group_filter_is_noop() {
        let f = filters(&["+nonexistent"], &[]);
        assert!(!f.is_selected(&to_vec(&["dev"]), "lib", false).selected);
    }

    #[test]
    fn test_flattened_round_trips() {
        let f = filters(&["+dev", "-doc@docs"], &["+test"]);
        assert_eq!(f.flattened(), vec!["+dev", "-doc@docs", "+test"]);
    }

    #[test]
    fn test_monotonicity_enabling_group_never_removes() {
        // Anything selected without filters stays selected with +extra.
        let none = filters(&[], &[]);
        let more = filters(&[], &["+extra"]);
        for groups in [vec![], to_vec(&["extra"])] {
            let before = none.is_selected(&groups, "p", false).selected;
            let after = more.is_selected(&groups, "p", false).selected;
            assert!(!before || after);
        }
    }
}
