//! The two compiler passes.
//!
//! Pass 0 ([`declaration`]) reads the whole class once and builds its
//! property table and node forest: variables, enums, callable signatures,
//! states. Bodies are skipped, only their source positions are kept.
//!
//! Pass 1 ([`compilation`]) revisits each recorded body and emits its
//! bytecode. It runs only after Pass 0 has completed for every class in the
//! build, so a body may call anything declared anywhere.

pub(crate) mod compilation;
pub(crate) mod declaration;
