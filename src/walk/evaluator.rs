//! Compilation of one rule expression.

use super::expression::{parse_expression, Expression, LookupKind, MatcherExpr, PathStep};
use super::lookup::Lookups;
use super::step::{clean_version, Step, WalkResult};
use super::WalkList;
use crate::error::{Result, UserAgentError};
use crate::normalize;
use crate::registry::{ActionRef, InterestRegistry, MAX_PREFIX_HASH_MATCH};
use crate::splitter::{Splitter, WORD_SPLITTER};
use crate::tree::{NodeId, SyntaxTree};

/// A compiled expression: a constant or hash entries plus a walk list.
///
/// # Examples
///
/// ```rust
/// use useragent_engine::registry::{ActionRef, CollectingRegistry};
/// use useragent_engine::walk::{Lookups, TreeExpressionEvaluator};
///
/// let evaluator = TreeExpressionEvaluator::new(
///     r#"agent.(1)product.(1)name="Mozilla"^.(1)version"#,
///     &Lookups::new(),
/// )?;
/// assert_eq!(evaluator.walk_list().to_string(), "Up(), Down([1:1]version)");
///
/// let mut registry = CollectingRegistry::new();
/// evaluator.calculate_inform_path(ActionRef::new(0, 0), &mut registry);
/// assert_eq!(registry.keys(), &["agent.(1)product.(1)name=\"Mozilla\"".to_string()]);
/// # Ok::<(), useragent_engine::UserAgentError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TreeExpressionEvaluator {
    expression: String,
    parsed: Expression,
    fixed_value: Option<String>,
    walk_list: WalkList,
}

impl TreeExpressionEvaluator {
    pub fn new(expression: &str, lookups: &Lookups) -> Result<Self> {
        let parsed = parse_expression(expression)?;
        let fixed_value = fold_fixed_value(expression, &parsed.matcher, lookups)?;

        if parsed.is_null && fixed_value.is_some() {
            return Err(UserAgentError::invalid_expression(
                expression,
                "IsNull around a fixed value can never match",
            ));
        }

        let walk_list = if fixed_value.is_some() {
            WalkList::default()
        } else {
            WalkListBuilder::new(expression, lookups).build(&parsed)?
        };

        Ok(Self {
            expression: expression.to_string(),
            parsed,
            fixed_value,
            walk_list,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The constant this expression always produces, if it is one.
    pub fn fixed_value(&self) -> Option<&str> {
        self.fixed_value.as_deref()
    }

    pub fn walk_list(&self) -> &WalkList {
        &self.walk_list
    }

    pub fn uses_is_null(&self) -> bool {
        self.parsed.is_null
    }

    /// The variable this expression starts from (`@Name...`).
    pub fn variable_name(&self) -> Option<&str> {
        match self.parsed.matcher.base() {
            MatcherExpr::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn prune_trailing_steps_that_cannot_fail(&mut self) {
        self.walk_list.prune_trailing_steps_that_cannot_fail();
    }

    /// Run the walk list from a node that matched one of the hash entries.
    pub fn evaluate(&self, tree: &SyntaxTree, node: NodeId, value: &str) -> Option<WalkResult> {
        self.walk_list.walk(tree, node, Some(value))
    }

    /// Register the hash entries of this expression; returns how many.
    ///
    /// Every `(*)` or `(N-M)` range is expanded, so one expression can
    /// register many concrete paths.
    pub fn calculate_inform_path(
        &self,
        action: ActionRef,
        registry: &mut dyn InterestRegistry,
    ) -> usize {
        match self.parsed.matcher.base() {
            MatcherExpr::Agent { steps } => inform_path(steps, "agent", action, registry),
            _ => 0,
        }
    }
}

fn inform_path(
    steps: &[PathStep],
    tree_name: &str,
    action: ActionRef,
    registry: &mut dyn InterestRegistry,
) -> usize {
    let (step, rest) = match steps.split_first() {
        Some(split) => split,
        None => {
            registry.inform_me_about(action, tree_name);
            return 1;
        }
    };

    match step {
        PathStep::Down { first, last, kind } => (*first..=*last)
            .map(|ordinal| {
                let child = format!("{tree_name}.({ordinal}){kind}");
                inform_path(rest, &child, action, registry)
            })
            .sum(),
        PathStep::Equals(value) => {
            registry.inform_me_about(action, &format!("{tree_name}=\"{value}\""));
            1
        }
        PathStep::StartsWith(prefix) => {
            registry.inform_me_about_prefix(action, tree_name, prefix);
            1
        }
        PathStep::WordRange(range) => {
            registry.looking_for_range(tree_name, *range);
            inform_path(rest, &format!("{tree_name}{range}"), action, registry)
        }
        _ => {
            registry.inform_me_about(action, tree_name);
            1
        }
    }
}

fn fold_fixed_value(
    expression: &str,
    matcher: &MatcherExpr,
    lookups: &Lookups,
) -> Result<Option<String>> {
    let fold = |inner: &MatcherExpr| fold_fixed_value(expression, inner, lookups);

    Ok(match matcher {
        MatcherExpr::Fixed(value) => Some(value.clone()),
        MatcherExpr::Variable { .. } | MatcherExpr::Agent { .. } => None,
        MatcherExpr::Concat {
            prefix,
            inner,
            postfix,
        } => fold(inner)?.map(|value| {
            format!(
                "{}{}{}",
                prefix.as_deref().unwrap_or(""),
                value,
                postfix.as_deref().unwrap_or("")
            )
        }),
        MatcherExpr::NormalizeBrand(inner) => fold(inner)?.map(|value| normalize::brand(&value)),
        MatcherExpr::CleanVersion(inner) => fold(inner)?.map(|value| clean_version(&value)),
        MatcherExpr::WordRange { inner, range } => match fold(inner)? {
            Some(value) => {
                let words = WORD_SPLITTER.split_range(&value, *range).ok_or_else(|| {
                    UserAgentError::invalid_expression(
                        expression,
                        format!("Word range {range} is outside of fixed value \"{value}\""),
                    )
                })?;
                Some(words.to_string())
            }
            None => None,
        },
        MatcherExpr::Lookup {
            kind,
            name,
            inner,
            default,
        } => match fold(inner)? {
            Some(value) => {
                let lookup = lookups.lookup(name)?;
                let lowered = value.to_lowercase();
                let found = match kind {
                    LookupKind::Lookup => lookup.get(&lowered).map(str::to_string),
                    LookupKind::LookupPrefix => {
                        lookup.ensure_prefix_map()?;
                        lookup.get_longest_prefix(&value).map(str::to_string)
                    }
                    LookupKind::IsInLookupPrefix => {
                        lookup.ensure_prefix_map()?;
                        lookup.get_longest_prefix(&value).map(|_| value.clone())
                    }
                    LookupKind::LookupContains => lookup.get_contains(&lowered).map(str::to_string),
                    LookupKind::IsInLookupContains => {
                        lookup.get_contains(&lowered).map(|_| value.clone())
                    }
                };
                let resolved = found.or_else(|| default.clone()).ok_or_else(|| {
                    UserAgentError::FixedValueNotInLookup {
                        value,
                        lookup: name.clone(),
                    }
                })?;
                Some(resolved)
            }
            None => None,
        },
    })
}

/// Turns the parsed expression into steps.
///
/// The leading part of a path that can be resolved by a hash lookup is not
/// added as steps: adding starts at the first step that the hash entry
/// cannot express.
struct WalkListBuilder<'a> {
    expression: &'a str,
    lookups: &'a Lookups,
    steps: Vec<Step>,
    found_hash_entry_point: bool,
}

impl<'a> WalkListBuilder<'a> {
    fn new(expression: &'a str, lookups: &'a Lookups) -> Self {
        Self {
            expression,
            lookups,
            steps: Vec::new(),
            found_hash_entry_point: false,
        }
    }

    fn build(mut self, parsed: &Expression) -> Result<WalkList> {
        if parsed.is_null {
            self.steps.push(Step::IsNull);
        }
        self.visit_matcher(&parsed.matcher)?;
        Ok(WalkList::new(self.steps))
    }

    fn add(&mut self, step: Step) {
        if self.found_hash_entry_point {
            self.steps.push(step);
        }
    }

    fn from_here_it_cannot_be_in_hash_map_anymore(&mut self) {
        self.found_hash_entry_point = true;
    }

    fn visit_matcher(&mut self, matcher: &MatcherExpr) -> Result<()> {
        match matcher {
            MatcherExpr::Fixed(_) => Err(UserAgentError::invalid_expression(
                self.expression,
                "A fixed value cannot be walked",
            )),
            MatcherExpr::Variable { steps, .. } => {
                self.from_here_it_cannot_be_in_hash_map_anymore();
                self.visit_steps(steps)
            }
            MatcherExpr::Agent { steps } => self.visit_steps(steps),
            MatcherExpr::Concat {
                prefix,
                inner,
                postfix,
            } => {
                self.visit_matcher(inner)?;
                self.from_here_it_cannot_be_in_hash_map_anymore();
                let step = match (prefix, postfix) {
                    (Some(prefix), Some(postfix)) => Step::Concat {
                        prefix: prefix.clone(),
                        postfix: postfix.clone(),
                    },
                    (Some(prefix), None) => Step::ConcatPrefix(prefix.clone()),
                    (None, Some(postfix)) => Step::ConcatPostfix(postfix.clone()),
                    (None, None) => {
                        return Err(UserAgentError::invalid_expression(
                            self.expression,
                            "Concat needs a prefix or a postfix",
                        ))
                    }
                };
                self.add(step);
                Ok(())
            }
            MatcherExpr::NormalizeBrand(inner) => {
                self.visit_matcher(inner)?;
                self.from_here_it_cannot_be_in_hash_map_anymore();
                self.add(Step::NormalizeBrand);
                Ok(())
            }
            MatcherExpr::CleanVersion(inner) => {
                self.visit_matcher(inner)?;
                self.from_here_it_cannot_be_in_hash_map_anymore();
                self.add(Step::CleanVersion);
                Ok(())
            }
            MatcherExpr::WordRange { inner, range } => {
                self.visit_matcher(inner)?;
                self.from_here_it_cannot_be_in_hash_map_anymore();
                self.add(Step::WordRange(*range));
                Ok(())
            }
            MatcherExpr::Lookup {
                kind,
                name,
                inner,
                default,
            } => {
                self.visit_matcher(inner)?;
                self.from_here_it_cannot_be_in_hash_map_anymore();
                let lookup = self.lookups.lookup(name)?;
                let step = match kind {
                    LookupKind::Lookup => Step::Lookup {
                        lookup,
                        default: default.clone(),
                    },
                    LookupKind::LookupPrefix => {
                        lookup.ensure_prefix_map()?;
                        Step::LookupPrefix {
                            lookup,
                            default: default.clone(),
                        }
                    }
                    LookupKind::IsInLookupPrefix => {
                        lookup.ensure_prefix_map()?;
                        Step::IsInLookupPrefix(lookup)
                    }
                    LookupKind::LookupContains => Step::LookupContains {
                        lookup,
                        default: default.clone(),
                    },
                    LookupKind::IsInLookupContains => Step::IsInLookupContains(lookup),
                };
                self.add(step);
                Ok(())
            }
        }
    }

    fn visit_steps(&mut self, steps: &[PathStep]) -> Result<()> {
        for step in steps {
            match step {
                PathStep::Down { first, last, kind } => self.add(Step::Down {
                    first: *first,
                    last: *last,
                    kind: *kind,
                }),
                PathStep::Equals(value) => {
                    self.add(Step::Equals(value.to_lowercase()));
                    self.from_here_it_cannot_be_in_hash_map_anymore();
                }
                PathStep::StartsWith(value) => {
                    let step = Step::StartsWith(value.to_lowercase());
                    if self.found_hash_entry_point {
                        self.add(step);
                    } else {
                        // The hash key only holds the first few characters.
                        self.from_here_it_cannot_be_in_hash_map_anymore();
                        if value.chars().count() > MAX_PREFIX_HASH_MATCH {
                            self.add(step);
                        }
                    }
                }
                PathStep::WordRange(range) => self.add(Step::WordRange(*range)),
                other => {
                    self.from_here_it_cannot_be_in_hash_map_anymore();
                    let step = match other {
                        PathStep::Up => Step::Up,
                        PathStep::Next(count) => Step::Next(*count),
                        PathStep::Prev(count) => Step::Prev(*count),
                        PathStep::NotEquals(value) => Step::NotEquals(value.to_lowercase()),
                        PathStep::EndsWith(value) => Step::EndsWith(value.to_lowercase()),
                        PathStep::Contains(value) => Step::Contains(value.to_lowercase()),
                        PathStep::IsInSet(name) => Step::IsInSet(self.lookups.set(name)?),
                        PathStep::IsNotInSet(name) => Step::IsNotInSet(self.lookups.set(name)?),
                        _ => Step::BackToFull,
                    };
                    self.add(step);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CollectingRegistry;
    use crate::splitter::WordRange;
    use crate::walk::lookup::{Lookup, LookupSet};

    const TRIDENT: &str = r#"IsNull[LookUp[TridentVersions;agent.(1)product.(2-4)comments.(*)product.name[1]="Trident"[2-3]~"Foo"^.(*)version[-2]{"7.";"DefaultValue"]]"#;

    fn lookups() -> Lookups {
        let mut lookups = Lookups::new();
        lookups
            .add_lookup(Lookup::new(
                "TridentVersions",
                [("7.0", "11"), ("6.0", "10")],
            ))
            .unwrap();
        lookups
            .add_lookup(Lookup::new("Brands", [("sm", "Samsung"), ("nokia", "Nokia")]))
            .unwrap();
        lookups
            .add_set(LookupSet::new("Mobile", ["Android"]))
            .unwrap();
        lookups
    }

    fn compile(expression: &str) -> (TreeExpressionEvaluator, CollectingRegistry) {
        let evaluator = TreeExpressionEvaluator::new(expression, &lookups()).unwrap();
        let mut registry = CollectingRegistry::new();
        let count = evaluator.calculate_inform_path(ActionRef::new(0, 0), &mut registry);
        assert_eq!(count, registry.keys().len());
        (evaluator, registry)
    }

    #[test]
    fn test_trident_expression() {
        let (evaluator, registry) = compile(TRIDENT);

        assert_eq!(
            evaluator.walk_list().to_string(),
            "IsNull(), WordRange([2:3]), Contains(foo), Up(), Down([1:5]version), \
             WordRange([1:2]), StartsWith(7.), Lookup(@TridentVersions ; default=DefaultValue)"
        );
        assert!(evaluator.uses_is_null());

        let keys = registry.keys();
        assert_eq!(keys.len(), 30);
        assert_eq!(
            keys[0],
            "agent.(1)product.(2)comments.(1)product.(1)name[1-1]=\"Trident\""
        );
        assert_eq!(
            keys[29],
            "agent.(1)product.(4)comments.(10)product.(1)name[1-1]=\"Trident\""
        );
        for comments in 2..=4 {
            for product in 1..=10 {
                let key = format!(
                    "agent.(1)product.({comments})comments.({product})product.(1)name[1-1]=\"Trident\""
                );
                assert!(keys.contains(&key), "missing {key}");
            }
        }
        assert_eq!(
            registry.ranges("agent.(1)product.(3)comments.(7)product.(1)name"),
            vec![WordRange::single(1)]
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let (first, first_registry) = compile(TRIDENT);
        let (second, second_registry) = compile(TRIDENT);
        assert_eq!(first.walk_list().to_string(), second.walk_list().to_string());
        assert_eq!(first_registry.keys(), second_registry.keys());
    }

    #[test]
    fn test_short_prefix_is_fully_hashed() {
        let (evaluator, registry) = compile(r#"agent.(1)product.(1)name{"One""#);
        assert!(evaluator.walk_list().is_empty());
        assert_eq!(registry.keys(), &["agent.(1)product.(1)name{\"One\"".to_string()]);
        assert_eq!(registry.prefix_lengths("agent.(1)product.(1)name"), vec![3]);
    }

    #[test]
    fn test_long_prefix_keeps_starts_with_step() {
        let (evaluator, registry) = compile(r#"agent.(1)product.(1)name{"OneTwoThree""#);
        assert_eq!(evaluator.walk_list().to_string(), "StartsWith(onetwothree)");
        assert_eq!(registry.keys(), &["agent.(1)product.(1)name{\"One\"".to_string()]);
    }

    #[test]
    fn test_plain_path_and_set_steps() {
        let (evaluator, registry) = compile("agent.(1)product.(1)comments.(2)entry?Mobile");
        assert_eq!(evaluator.walk_list().to_string(), "IsInSet(@Mobile)");
        assert_eq!(
            registry.keys(),
            &["agent.(1)product.(1)comments.(2)entry".to_string()]
        );
    }

    #[test]
    fn test_variable_expressions_register_nothing() {
        let (evaluator, registry) = compile("CleanVersion[@Version^.(1)name]");
        assert_eq!(evaluator.variable_name(), Some("Version"));
        assert_eq!(
            evaluator.walk_list().to_string(),
            "Up(), Down([1:1]name), CleanVersion()"
        );
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn test_fixed_values_are_folded() {
        let lookups = lookups();
        let fixed = |expression: &str| {
            TreeExpressionEvaluator::new(expression, &lookups)
                .unwrap()
                .fixed_value()
                .map(str::to_string)
        };
        assert_eq!(fixed(r#""Plain""#).as_deref(), Some("Plain"));
        assert_eq!(fixed(r#"Concat["v";CleanVersion["1_2"]]"#).as_deref(), Some("v1.2"));
        assert_eq!(fixed(r#"NormalizeBrand["samsung"]"#).as_deref(), Some("Samsung"));
        assert_eq!(fixed(r#""one two three"[2-3]"#).as_deref(), Some("two three"));
        assert_eq!(fixed(r#"LookUp[Brands;"SM"]"#).as_deref(), Some("Samsung"));
        assert_eq!(fixed(r#"LookUp[Brands;"Other";"Unknown"]"#).as_deref(), Some("Unknown"));
        assert_eq!(fixed(r#"LookUpPrefix[Brands;"SM-G960F"]"#).as_deref(), Some("Samsung"));
        assert_eq!(fixed(r#"LookUpContains[Brands;"a nokia phone"]"#).as_deref(), Some("Nokia"));
        assert_eq!(fixed(r#"IsInLookUpContains[Brands;"a nokia phone"]"#).as_deref(), Some("a nokia phone"));
        assert_eq!(fixed("agent.(1)product"), None);
    }

    #[test]
    fn test_configuration_errors() {
        let lookups = lookups();
        let error = |expression: &str| TreeExpressionEvaluator::new(expression, &lookups).unwrap_err();

        assert_eq!(
            error(r#"LookUp[Brands;"Other"]"#),
            UserAgentError::FixedValueNotInLookup {
                value: "Other".to_string(),
                lookup: "Brands".to_string(),
            }
        );
        assert_eq!(
            error("LookUp[Missing;agent.(1)product]"),
            UserAgentError::MissingLookup("Missing".to_string())
        );
        assert_eq!(
            error("agent.(1)product?Missing"),
            UserAgentError::MissingSet("Missing".to_string())
        );
        assert!(matches!(
            error(r#"IsNull["fixed"]"#),
            UserAgentError::InvalidExpression { .. }
        ));
        assert!(matches!(
            error(r#""one"[3]"#),
            UserAgentError::InvalidExpression { .. }
        ));
    }

    #[test]
    fn test_prefix_lookup_with_non_ascii_key_is_rejected() {
        let mut lookups = Lookups::new();
        lookups
            .add_lookup(Lookup::new("Bad", [("ümlaut", "x")]))
            .unwrap();
        assert!(matches!(
            TreeExpressionEvaluator::new("LookUpPrefix[Bad;agent.(1)product]", &lookups),
            Err(UserAgentError::InvalidLookup { .. })
        ));
        assert!(TreeExpressionEvaluator::new("LookUp[Bad;agent.(1)product]", &lookups).is_ok());
    }

    #[test]
    fn test_evaluate_against_tree() {
        use crate::tree::parser::parse;

        let (evaluator, _) = compile(r#"agent.(1)product.(1)name="Mozilla"^.(1)version"#);
        let tree = parse("Mozilla/5.0 (X11)");
        let product = tree.children(tree.root())[0];
        let name = tree.children(product)[0];
        let result = evaluator.evaluate(&tree, name, "Mozilla").unwrap();
        assert_eq!(result.value, "5.0");
    }
}
