//! Step filters
//!
//! A [`StepFilter`] decides which leaves survive when a plan is turned back
//! into a builder. Any `Fn(&Step<T>) -> bool` is a filter; [`StepFilters`]
//! has the common ones.

use crate::step::Step;
use serde_json::Value;
use std::collections::HashSet;

/// Predicate over a step
pub trait StepFilter<T> {
    /// Return `true` to keep the step
    fn accept(&self, step: &Step<T>) -> bool;
}

impl<T, F> StepFilter<T> for F
where
    F: Fn(&Step<T>) -> bool,
{
    #[inline]
    fn accept(&self, step: &Step<T>) -> bool {
        self(step)
    }
}

/// Constructors for common filters
#[derive(Debug, Clone, Copy)]
pub struct StepFilters;

impl StepFilters {
    /// Keep everything
    #[must_use]
    pub fn accept_all<T>() -> impl StepFilter<T> + Clone {
        |_: &Step<T>| true
    }

    /// Keep only steps whose id is listed
    #[must_use]
    pub fn ids<T, I, S>(ids: I) -> impl StepFilter<T> + Clone
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        move |step: &Step<T>| ids.contains(step.id())
    }

    /// Drop steps whose id is listed
    #[must_use]
    pub fn exclude_ids<T, I, S>(ids: I) -> impl StepFilter<T> + Clone
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        move |step: &Step<T>| !ids.contains(step.id())
    }

    /// Keep steps whose metadata entry `key` equals `value`
    #[must_use]
    pub fn metadata_eq<T>(key: impl Into<String>, value: impl Into<Value>) -> impl StepFilter<T> + Clone {
        let key = key.into();
        let value = value.into();
        move |step: &Step<T>| step.metadata().get(&key) == Some(&value)
    }

    /// Invert a filter
    #[must_use]
    pub fn not<T, F: StepFilter<T>>(filter: F) -> impl StepFilter<T> {
        move |step: &Step<T>| !filter.accept(step)
    }

    /// Keep steps accepted by both filters
    #[must_use]
    pub fn and<T, A: StepFilter<T>, B: StepFilter<T>>(a: A, b: B) -> impl StepFilter<T> {
        move |step: &Step<T>| a.accept(step) && b.accept(step)
    }

    /// Keep steps accepted by either filter
    #[must_use]
    pub fn or<T, A: StepFilter<T>, B: StepFilter<T>>(a: A, b: B) -> impl StepFilter<T> {
        move |step: &Step<T>| a.accept(step) || b.accept(step)
    }
}
