//! # Architecture Port Layer
//!
//! Hardware-specific glue, kept to the bare minimum this kernel needs:
//! a tick source. Gated behind the `cortex-m4` feature so host-side
//! tests never pull in `cortex-m`/`cortex-m-rt`.

#[cfg(feature = "cortex-m4")]
pub mod cortex_m4;
