//! Pipeline stages for mesh-to-PDF conversion.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the two external stages can be swapped through their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ paths ──▶ mesh ──▶ embed
//! (.obj)   (layout)  (U3D)    (PDF)
//! ```
//!
//! 1. [`input`] — validate the mesh path and count its records
//! 2. [`paths`] — derive the intermediate and output locations
//! 3. [`mesh`]  — decimate and encode to U3D via [`mesh::MeshConverter`]
//! 4. [`embed`] — typeset the PDF via [`embed::DocumentEmbedder`]
//!
//! [`tool`] holds the subprocess runner both command-backed stages share.

pub mod embed;
pub mod input;
pub mod mesh;
pub mod paths;
pub mod tool;
