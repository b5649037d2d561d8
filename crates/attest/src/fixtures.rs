//! Sample datasets for tests and demos

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_HEADER: &str = "id,name,category,value,score";
const CATEGORIES: [&str; 4] = ["A", "B", "C", "D"];

/// `rows` well-typed rows under the standard header, reproducible per `seed`.
pub fn sample_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::with_capacity(32 * (rows + 1));
    out.push_str(SAMPLE_HEADER);

    for i in 1..=rows {
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let value: f64 = rng.gen_range(0.0..100.0);
        let score: f64 = rng.gen_range(0.0..10.0);
        out.push('\n');
        out.push_str(&format!("{i},item_{i},{category},{value:.2},{score:.2}"));
    }
    out
}
