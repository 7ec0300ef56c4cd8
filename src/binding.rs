//! Binding declarations and the per-request parser aggregate.
//!
//! An endpoint declares its bindings once, on an [`AggregateBuilder`]. The
//! resulting [`ParserAggregate`] is immutable and shared by every request:
//! synchronous bindings run first against request metadata, then the
//! asynchronous ones run strictly in declaration order (the body can only be
//! consumed once, so there is nothing to gain from racing them). The first
//! failure aborts the whole parse.

use std::future::Future;
use std::pin::Pin;

use http_kit::Request;
use serde_json::Value;

use crate::error::{Error, ValidationError};
use crate::parser::{Parser, UploadedFile};

/// A value resolved by one binding.
#[derive(Debug, Clone)]
pub enum BoundValue {
    /// A loaded schema value.
    Value(Value),
    /// Files selected by an upload binding.
    Files(Vec<UploadedFile>),
    /// A nested group's resolved arguments.
    Group(Args),
}

/// The ordered arguments handed to a handler.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<(String, BoundValue)>);

impl Args {
    /// Look up a binding by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.0
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    /// The loaded value bound under `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(BoundValue::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// The files bound under `name`.
    #[must_use]
    pub fn files(&self, name: &str) -> Option<&[UploadedFile]> {
        match self.get(name) {
            Some(BoundValue::Files(files)) => Some(files),
            _ => None,
        }
    }

    /// The group arguments bound under `name`.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Args> {
        match self.get(name) {
            Some(BoundValue::Group(args)) => Some(args),
            _ => None,
        }
    }

    /// Iterate the bindings in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// A reusable set of bindings resolved together as one named value.
///
/// Groups are explicit: a type opts in by declaring its sub-bindings and how
/// to read itself back out of the resolved [`Args`].
pub trait ParamGroup: Sized + Send + Sync + 'static {
    /// Declare the group's sub-bindings.
    fn bindings(builder: AggregateBuilder) -> AggregateBuilder;

    /// Construct the typed group from its resolved sub-bindings.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the resolved values do not fit.
    fn from_args(args: &Args) -> Result<Self, ValidationError>;
}

#[derive(Debug)]
enum Binding {
    Parser(Parser),
    Group(ParserAggregate),
}

/// Declares an endpoint's bindings in order.
#[derive(Debug, Default)]
pub struct AggregateBuilder {
    sync: Vec<(String, Parser)>,
    asynchronous: Vec<(String, Binding)>,
}

impl AggregateBuilder {
    /// Bind `parser` under `name`.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, parser: impl Into<Parser>) -> Self {
        let parser = parser.into();
        if parser.is_async() {
            self.asynchronous.push((name.into(), Binding::Parser(parser)));
        } else {
            self.sync.push((name.into(), parser));
        }
        self
    }

    /// Bind the group `G` under `name`.
    ///
    /// A group always resolves in the asynchronous phase, whatever its
    /// sub-bindings contain.
    #[must_use]
    pub fn group<G: ParamGroup>(mut self, name: impl Into<String>) -> Self {
        let aggregate = G::bindings(AggregateBuilder::default()).build();
        self.asynchronous
            .push((name.into(), Binding::Group(aggregate)));
        self
    }

    /// Finalize the aggregate.
    #[must_use]
    pub fn build(self) -> ParserAggregate {
        ParserAggregate {
            sync: self.sync,
            asynchronous: self.asynchronous,
        }
    }
}

/// The full, ordered binding set of an endpoint.
#[derive(Debug, Default)]
pub struct ParserAggregate {
    sync: Vec<(String, Parser)>,
    asynchronous: Vec<(String, Binding)>,
}

impl ParserAggregate {
    /// True when the endpoint binds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asynchronous.is_empty()
    }

    /// Every parser in resolution order, groups flattened in place.
    pub(crate) fn parsers(&self) -> Vec<&Parser> {
        let mut out = Vec::new();
        self.collect_parsers(&mut out);
        out
    }

    fn collect_parsers<'a>(&'a self, out: &mut Vec<&'a Parser>) {
        for (_, parser) in &self.sync {
            out.push(parser);
        }
        for (_, binding) in &self.asynchronous {
            match binding {
                Binding::Parser(parser) => out.push(parser),
                Binding::Group(aggregate) => aggregate.collect_parsers(out),
            }
        }
    }

    /// Resolve every binding against `request`.
    ///
    /// # Errors
    ///
    /// Propagates the first binding failure untouched.
    pub async fn parse(&self, request: &mut Request) -> Result<Args, Error> {
        let mut args = Vec::with_capacity(self.sync.len() + self.asynchronous.len());

        for (name, parser) in &self.sync {
            args.push((name.clone(), parser.parse_sync(request)?));
        }
        for (name, binding) in &self.asynchronous {
            let value = match binding {
                Binding::Parser(parser) => parser.parse_async(request).await?,
                Binding::Group(aggregate) => BoundValue::Group(aggregate.parse_boxed(request).await?),
            };
            args.push((name.clone(), value));
        }
        Ok(Args(args))
    }

    fn parse_boxed<'a>(
        &'a self,
        request: &'a mut Request,
    ) -> Pin<Box<dyn Future<Output = Result<Args, Error>> + Send + 'a>> {
        Box::pin(self.parse(request))
    }
}
