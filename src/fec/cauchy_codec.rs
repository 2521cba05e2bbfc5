//! Systematic Cauchy Reed-Solomon erasure code over GF(2^8).
//!
//! Repair symbol `i` is `sum_j C[i][j] * source_j` with
//! `C[i][j] = 1 / ((k + i) xor j)`. Every square submatrix of a Cauchy matrix
//! is invertible, so any `k` of the `k + m` symbols rebuild the block.

use std::collections::BTreeMap;

use super::{block_codec::BlockCodec, fec_error::FecError, gf256};

#[derive(Debug, Default, Clone, Copy)]
pub struct CauchyBlockCodec;

impl CauchyBlockCodec {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn coeff(source_count: usize, repair_index: usize, source_index: usize) -> u8 {
        let x = (source_count + repair_index) as u8;
        let y = source_index as u8;
        gf256::inv(x ^ y)
    }
}

fn symbol_len(symbols: &[Vec<u8>]) -> Result<usize, FecError> {
    let len = symbols.first().map_or(0, Vec::len);
    if let Some(bad) = symbols.iter().find(|s| s.len() != len) {
        return Err(FecError::SymbolSizeMismatch {
            expected: len,
            got: bad.len(),
        });
    }
    Ok(len)
}

impl BlockCodec for CauchyBlockCodec {
    fn encode_block(
        &self,
        source: &[Vec<u8>],
        repair_count: usize,
    ) -> Result<Vec<Vec<u8>>, FecError> {
        let k = source.len();
        if k == 0 {
            return Err(FecError::EmptyBlock);
        }
        if k + repair_count > self.max_symbols() {
            return Err(FecError::BlockTooLarge {
                symbols: k + repair_count,
                max: self.max_symbols(),
            });
        }
        let len = symbol_len(source)?;
        let mut repairs = vec![vec![0u8; len]; repair_count];
        for (i, r) in repairs.iter_mut().enumerate() {
            for (j, s) in source.iter().enumerate() {
                gf256::mul_add(r, Self::coeff(k, i, j), s);
            }
        }
        Ok(repairs)
    }

    fn decode_block(
        &self,
        source_count: usize,
        total_count: usize,
        received: &[(usize, Vec<u8>)],
    ) -> Result<Vec<Vec<u8>>, FecError> {
        let k = source_count;
        if k == 0 {
            return Err(FecError::EmptyBlock);
        }
        if total_count > self.max_symbols() || total_count < k {
            return Err(FecError::BlockTooLarge {
                symbols: total_count,
                max: self.max_symbols(),
            });
        }
        let mut sources: BTreeMap<usize, &[u8]> = BTreeMap::new();
        let mut repairs: BTreeMap<usize, &[u8]> = BTreeMap::new();
        let mut len = None;
        for (id, data) in received {
            if *id >= total_count {
                return Err(FecError::InvalidSymbolId(*id));
            }
            let expected = *len.get_or_insert(data.len());
            if data.len() != expected {
                return Err(FecError::SymbolSizeMismatch {
                    expected,
                    got: data.len(),
                });
            }
            if *id < k {
                sources.insert(*id, data);
            } else {
                repairs.insert(*id - k, data);
            }
        }
        let len = len.unwrap_or(0);
        let missing: Vec<usize> = (0..k).filter(|j| !sources.contains_key(j)).collect();
        if missing.is_empty() {
            return Ok(sources.values().map(|s| s.to_vec()).collect());
        }
        if repairs.len() < missing.len() {
            return Err(FecError::Unrecoverable {
                received: sources.len() + repairs.len(),
                needed: k,
            });
        }

        // Reduce each used repair to a combination of the missing sources only.
        let e = missing.len();
        let mut matrix: Vec<Vec<u8>> = Vec::with_capacity(e);
        let mut rhs: Vec<Vec<u8>> = Vec::with_capacity(e);
        for (&ri, &data) in repairs.iter().take(e) {
            let mut row_rhs = data.to_vec();
            for (&j, &s) in &sources {
                gf256::mul_add(&mut row_rhs, Self::coeff(k, ri, j), s);
            }
            matrix.push(missing.iter().map(|&j| Self::coeff(k, ri, j)).collect());
            rhs.push(row_rhs);
        }

        // Gauss-Jordan elimination over GF(256).
        for col in 0..e {
            let pivot = (col..e)
                .find(|&r| matrix[r][col] != 0)
                .ok_or(FecError::Unrecoverable {
                    received: sources.len() + repairs.len(),
                    needed: k,
                })?;
            matrix.swap(col, pivot);
            rhs.swap(col, pivot);
            let inv = gf256::inv(matrix[col][col]);
            gf256::scale(&mut matrix[col], inv);
            gf256::scale(&mut rhs[col], inv);
            for row in 0..e {
                if row == col || matrix[row][col] == 0 {
                    continue;
                }
                let factor = matrix[row][col];
                let pivot_row = matrix[col].clone();
                gf256::mul_add(&mut matrix[row], factor, &pivot_row);
                let pivot_rhs = rhs[col].clone();
                gf256::mul_add(&mut rhs[row], factor, &pivot_rhs);
            }
        }

        let mut recovered: BTreeMap<usize, Vec<u8>> = missing.into_iter().zip(rhs).collect();
        Ok((0..k)
            .map(|j| match sources.get(&j) {
                Some(s) => s.to_vec(),
                None => recovered.remove(&j).unwrap_or_else(|| vec![0; len]),
            })
            .collect())
    }

    fn max_symbols(&self) -> usize {
        256
    }
}
