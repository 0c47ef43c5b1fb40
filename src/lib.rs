//! A seed-and-extend short-read mapper over a prebuilt reference and
//! CRC-addressed hash-table image.
//!
//! The core pipeline (see [`mapper`]) is: build a seed from a read
//! offset, hash its packed bases, query the hash table for exact hits
//! or extend-table intervals, feed accepted placements into
//! orientation-consistent chains, rescue an unanchored mate from its
//! partner's chain when one side fails to seed, and finally pick the
//! best-scoring pair and compute per-mate MAPQ.

#![warn(missing_docs, missing_debug_implementations)]

pub mod mapper;
