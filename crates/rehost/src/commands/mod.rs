//! CLI command implementations.

pub(crate) mod localize;
pub(crate) mod sniff;

pub(crate) use localize::LocalizeArgs;
pub(crate) use sniff::SniffArgs;
