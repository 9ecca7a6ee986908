//! This example trains a fault-tolerant temporal memory on a repeating sequence and then kills
//! an increasing share of its cells. After every kill the network is shown the sequence again
//! (without learning) and the fraction of correctly predicted columns is reported.
//!
//! The accuracy degrades gracefully at first, because every column keeps several cells and
//! each transition is supported by more synapses than the activation threshold requires.

use htm_faulty::core::{faulty_temporal_memory::FaultyTemporalMemory, temporal_memory::TemporalMemoryParams};

fn main() -> anyhow::Result<()> {
    let params = TemporalMemoryParams {
        num_columns: 256,
        cells_per_column: 8,
        activation_threshold: 6,
        min_threshold: 4,
        initial_permanence: 0.51,
        max_new_synapse_count: 12,
        ..Default::default()
    };

    println!(
        "Initializing Temporal Memory with {} columns of {} cells...",
        params.num_columns, params.cells_per_column
    );

    let mut tm = FaultyTemporalMemory::new(params)?;

    // Ten elements of twelve active columns each.
    let sequence: Vec<Vec<usize>> = (0..10)
        .map(|element| (0..12).map(|i| (element * 25 + i * 2) % 256).collect())
        .collect();

    println!("Training...");

    for _ in 0..20 {
        for columns in &sequence {
            tm.compute(columns, true);
        }
        tm.reset();
    }

    println!("Trained for {} steps", tm.iteration());
    println!("Testing...");

    for step in 0..=10 {
        let percent = step as f64 * 0.05;
        tm.kill_cells(percent);

        let mut correct = 0;
        let mut total = 0;

        for columns in &sequence {
            tm.compute(columns, false);

            total += columns.len();
            correct += tm.predicted_columns().len();
        }
        tm.reset();

        // The first element can never be predicted after a reset.
        let possible = total - sequence[0].len();
        println!(
            "{:>5.1}% dead ({:>4} cells): {:>6.2}% of columns predicted",
            percent * 100.0,
            tm.dead_cells().len(),
            correct as f64 / possible as f64 * 100.0
        );
    }

    Ok(())
}
