//! # Complete Model Families

pub mod hdnet;
