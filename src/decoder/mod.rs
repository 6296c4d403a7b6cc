// C5 (random access) and C6 (streaming) decoders, split into their own
// submodules since they share only the container wire format, not any
// runtime state — the same separation of concerns as keeping a sequential
// reader (`y4m.rs`) and a structured writer (`isobmff.rs`) apart rather
// than folding them into one combined "IO" module.

pub mod random_access;
pub mod streaming;
