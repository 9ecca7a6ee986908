pub mod activation;
pub mod bursting;
pub mod column;
pub mod connections;
pub mod fault_mask;
pub mod faulty_temporal_memory;
pub mod learning;
pub mod matching;
pub mod propagation;
pub mod temporal_memory;
