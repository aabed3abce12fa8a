//! Named stages and middleware groups.
//!
//! Applications refer to middleware by name (in route definitions, or in
//! `ONION_MIDDLEWARE`), and a [`Registry`] turns those names into stages.
//! A group is a name standing for an ordered list of other names, possibly
//! including further groups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{BoxedStage, Stage};
use crate::error::Error;

#[derive(Clone, Default)]
pub struct Registry {
    stages: HashMap<String, BoxedStage>,
    groups: HashMap<String, Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `stage` under `name`, replacing any earlier registration.
    pub fn register(mut self, name: &str, stage: impl Stage) -> Self {
        self.stages.insert(name.to_owned(), Arc::new(stage));
        self
    }

    /// Defines a group. A group shadows a stage registered under the same name.
    ///
    /// ```rust
    /// use onion::middleware::{Registry, RequestId, Trace};
    ///
    /// let registry = Registry::new()
    ///     .register("trace", Trace)
    ///     .register("request-id", RequestId)
    ///     .group("web", ["trace", "request-id"]);
    ///
    /// let stages = registry.resolve(&["web", "trace"]).unwrap();
    /// assert_eq!(stages.len(), 2);
    /// ```
    pub fn group<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.insert(name.to_owned(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Expands `names` into stages, in order.
    ///
    /// A stage reached twice keeps its first (outermost) position.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<BoxedStage>, Error> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut path = Vec::new();
        for name in names {
            self.expand(name.as_ref(), &mut path, &mut seen, &mut out)?;
        }
        Ok(out)
    }

    fn expand(
        &self,
        name: &str,
        path: &mut Vec<String>,
        seen: &mut HashSet<String>,
        out: &mut Vec<BoxedStage>,
    ) -> Result<(), Error> {
        if let Some(members) = self.groups.get(name) {
            if path.iter().any(|p| p == name) {
                return Err(Error::GroupCycle(name.to_owned()));
            }
            path.push(name.to_owned());
            for member in members {
                self.expand(member, path, seen, out)?;
            }
            path.pop();
            return Ok(());
        }

        let stage = self
            .stages
            .get(name)
            .ok_or_else(|| Error::UnknownStage(name.to_owned()))?;
        if seen.insert(name.to_owned()) {
            out.push(Arc::clone(stage));
        }
        Ok(())
    }
}
