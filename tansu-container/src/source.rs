//! Pluggable configuration sources.
//!
//! A [`Source`] produces one raw entry tree; [`Container::load`]
//! merges a sequence of them in order, so later sources override
//! earlier ones exactly like hand-written [`extend`](Container::extend)
//! calls.

use tracing::debug;

use crate::container::Container;
use crate::entry::EntryMap;
use crate::error::Result;

/// Produces a tree of raw entries to merge into a container.
pub trait Source {
    fn load(&self, container: &Container) -> Result<EntryMap>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn load(&self, container: &Container) -> Result<EntryMap> {
        (**self).load(container)
    }
}

/// Adapts a closure into a [`Source`].
pub struct FnSource<F>(pub F);

impl<F> Source for FnSource<F>
where
    F: Fn(&Container) -> Result<EntryMap>,
{
    fn load(&self, container: &Container) -> Result<EntryMap> {
        (self.0)(container)
    }
}

impl Container {
    /// Loads sources in order, merging each tree as a layer. Stops at
    /// the first source or merge failure.
    pub fn load<I>(&self, sources: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: Source,
    {
        for (index, source) in sources.into_iter().enumerate() {
            debug!(index, "load source");
            let entries = source.load(self)?;
            self.extend(entries)?;
        }
        Ok(self)
    }
}
