/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use ndmask::Dense;
use ndmask::Range;
use tracing_subscriber::EnvFilter;

/// Builds a masked tensor and prints its mask reductions and regions.
/// ```
///   cargo run --bin mask_inspect -- --shape 2,3,2 --mask-dims false,false,true --masked 0 --axis 2
/// ```
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Extent of each dimension
    #[arg(long, value_delimiter = ',', required = true)]
    shape: Vec<usize>,

    /// Dimensions the mask varies along; the mask is broadcast along
    /// the others. Defaults to every dimension.
    #[arg(long, value_delimiter = ',')]
    mask_dims: Option<Vec<bool>>,

    /// Mask-buffer indices to mark invalid
    #[arg(long, value_delimiter = ',')]
    masked: Vec<usize>,

    /// Axis to reduce along, in addition to the whole tensor
    #[arg(long)]
    axis: Option<usize>,
}

fn main() -> Result<()> {
    // Initialize the tracing subscriber; level from RUST_LOG.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let args = Args::parse();

    let mut tensor = Dense::<f64>::new(args.shape.clone());
    if let Some(dims) = &args.mask_dims {
        tensor = tensor.with_mask_dims(dims)?;
    }
    if !args.masked.is_empty() {
        let mut mask = vec![false; tensor.mask_size()];
        for &index in &args.masked {
            let len = mask.len();
            *mask
                .get_mut(index)
                .with_context(|| format!("mask index {} out of range 0..{}", index, len))? = true;
        }
        tensor = tensor.with_mask(mask)?;
    }
    tracing::info!(shape = ?args.shape, masked = args.masked.len(), "built tensor");

    println!("{}", tensor.info());
    println!("mask:             {:?}", tensor.mask_to_vec());
    let mut axes = vec![None];
    axes.extend(args.axis.map(Some));
    for axis in axes {
        let label = match axis {
            Some(axis) => format!("axis {}", axis),
            None => "all".to_string(),
        };
        println!("[{}]", label);
        println!("  masked_any:       {}", tensor.masked_any(axis)?);
        println!("  masked_all:       {}", tensor.masked_all(axis)?);
        println!("  masked_count:     {}", tensor.masked_count(axis)?);
        println!("  non_masked_count: {}", tensor.non_masked_count(axis)?);
    }

    let fmt_ranges = |ranges: Vec<Range>| ranges.iter().map(|r| format!("[{}]", r)).join(" ");
    println!("unmasked runs:    {}", fmt_ranges(tensor.flat_not_masked_contiguous()));
    println!("masked runs:      {}", fmt_ranges(tensor.flat_masked_contiguous()));
    println!("unmasked edges:   {:?}", tensor.flat_not_masked_edges());
    println!("masked edges:     {:?}", tensor.flat_masked_edges());

    Ok(())
}
