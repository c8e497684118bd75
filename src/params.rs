//! Statement parameters and the split between driver binds and pre-bind fragments.

use std::collections::BTreeMap;

use crate::compose::Fragment;
use crate::error::SqlRunnerError;
use crate::types::RowValues;

/// A single parameter: either a value bound by the driver or a fragment rendered into the
/// statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(RowValues),
    Fragment(Fragment),
}

impl Param {
    /// Whether this parameter is substituted into the SQL text before execution.
    #[must_use]
    pub fn is_prebind(&self) -> bool {
        matches!(self, Param::Fragment(_))
    }
}

impl From<RowValues> for Param {
    fn from(value: RowValues) -> Self {
        Param::Value(value)
    }
}

impl From<Fragment> for Param {
    fn from(value: Fragment) -> Self {
        Param::Fragment(value)
    }
}

macro_rules! param_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Value(RowValues::from(value))
                }
            }
        )*
    };
}

param_from_value!(i64, i32, f64, bool, &str, String);

/// The parameters for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSet {
    Positional(Vec<Param>),
    Named(BTreeMap<String, Param>),
}

impl ParamSet {
    pub fn positional<I, P>(items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        ParamSet::Positional(items.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, P>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<Param>,
    {
        ParamSet::Named(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ParamSet::Positional(items) => items.len(),
            ParamSet::Named(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters for a whole run.
///
/// `Single` is broadcast to every statement; `PerStatement` must supply exactly one entry
/// per statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Single(ParamSet),
    PerStatement(Vec<Option<ParamSet>>),
}

impl Params {
    /// Check that the parameters can be paired with `statements` statements.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ParameterShapeError` when a per-statement list has the wrong
    /// length.
    pub fn check_shape(&self, statements: usize) -> Result<(), SqlRunnerError> {
        match self {
            Params::PerStatement(sets) if sets.len() != statements => {
                Err(SqlRunnerError::ParameterShapeError {
                    statements,
                    parameter_sets: sets.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Parameters for the statement at `index`.
    #[must_use]
    pub fn for_statement(&self, index: usize) -> Option<&ParamSet> {
        match self {
            Params::None => None,
            Params::Single(set) => Some(set),
            Params::PerStatement(sets) => sets.get(index).and_then(Option::as_ref),
        }
    }
}

impl From<ParamSet> for Params {
    fn from(value: ParamSet) -> Self {
        Params::Single(value)
    }
}

impl From<Option<ParamSet>> for Params {
    fn from(value: Option<ParamSet>) -> Self {
        value.map_or(Params::None, Params::Single)
    }
}

impl From<Vec<ParamSet>> for Params {
    fn from(value: Vec<ParamSet>) -> Self {
        Params::PerStatement(value.into_iter().map(Some).collect())
    }
}

/// Values handed to the driver as bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverParams {
    Positional(Vec<RowValues>),
    Named(BTreeMap<String, RowValues>),
}

impl DriverParams {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            DriverParams::Positional(items) => items.len(),
            DriverParams::Named(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fragments substituted into the statement text before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum PreBindParams {
    Positional(Vec<Fragment>),
    Named(BTreeMap<String, Fragment>),
}

impl PreBindParams {
    pub fn positional<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Fragment>,
    {
        PreBindParams::Positional(items.into_iter().collect())
    }

    pub fn named<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, Fragment)>,
        K: Into<String>,
    {
        PreBindParams::Named(items.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            PreBindParams::Positional(items) => items.len(),
            PreBindParams::Named(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split one statement's parameters into driver binds and pre-bind fragments.
///
/// Positional order is preserved on both sides; named parameters keep their keys. A side with
/// no entries is `None`.
#[must_use]
pub fn partition(params: Option<&ParamSet>) -> (Option<DriverParams>, Option<PreBindParams>) {
    let Some(params) = params else {
        return (None, None);
    };

    let (driver, prebind) = match params {
        ParamSet::Positional(items) => {
            let mut values = Vec::new();
            let mut fragments = Vec::new();
            for item in items {
                match item {
                    Param::Value(value) => values.push(value.clone()),
                    Param::Fragment(fragment) => fragments.push(fragment.clone()),
                }
            }
            (
                DriverParams::Positional(values),
                PreBindParams::Positional(fragments),
            )
        }
        ParamSet::Named(items) => {
            let mut values = BTreeMap::new();
            let mut fragments = BTreeMap::new();
            for (key, item) in items {
                match item {
                    Param::Value(value) => {
                        values.insert(key.clone(), value.clone());
                    }
                    Param::Fragment(fragment) => {
                        fragments.insert(key.clone(), fragment.clone());
                    }
                }
            }
            (DriverParams::Named(values), PreBindParams::Named(fragments))
        }
    };

    (
        (!driver.is_empty()).then_some(driver),
        (!prebind.is_empty()).then_some(prebind),
    )
}
