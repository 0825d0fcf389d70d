//! Ports: external collaborators the rotation engine and pipeline consume.

pub mod outbound;
