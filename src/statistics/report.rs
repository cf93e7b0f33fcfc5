//! Tab-delimited statistics report
//!
//! ```text
//! #Name       reads.fq
//! #PhredQual  33
//! #ReadNum    2
//! #MaxReadLength  5
//! #BaseCount  10
//! #Q20(>=20)  5   50.00%
//! ...
//! #Pos  A  C  G  T  N  AvgQual  ErrRate
//! 1     2  0  0  0  0  20.00    0.50
//! ```

use std::io::Write;

use super::{FqStatisticResult, QualityRow};
use crate::Result;

const Q20: usize = 20;
const Q30: usize = 30;

/// Writes the report for `result`
///
/// # Parameters
///
/// * `writer` - Destination of the report
/// * `result` - Aggregated statistics of the whole input
/// * `name` - Input file name printed in the `#Name` line
/// * `offset` - Quality offset printed in the `#PhredQual` line
///
/// Nothing is written when `result` holds no reads.
pub fn write_report<W: Write>(
    writer: &mut W,
    result: &FqStatisticResult,
    name: &str,
    offset: u8,
) -> Result<()> {
    if result.read_count == 0 {
        return Ok(());
    }

    writeln!(writer, "#Name\t{name}")?;
    writeln!(writer, "#PhredQual\t{offset}")?;
    writeln!(writer, "#ReadNum\t{}", result.read_count)?;
    writeln!(writer, "#MaxReadLength\t{}", result.max_read_length)?;
    writeln!(writer, "#BaseCount\t{}", result.total_bases)?;

    let [a, c, g, t, n] = result.base_totals();
    let summary = [
        ("Q20(>=20)", result.bases_at_or_above(Q20)),
        ("Q30(>=30)", result.bases_at_or_above(Q30)),
        ("A", a),
        ("C", c),
        ("G", g),
        ("T", t),
        ("N", n),
        ("GC", g + c),
    ];
    for (label, count) in summary {
        let pct = 100.0 * count as f64 / result.total_bases as f64;
        writeln!(writer, "#{label}\t{count}\t{pct:.2}%")?;
    }

    writer.write_all(b"#Pos\tA\tC\tG\tT\tN\tAvgQual\tErrRate\n")?;
    let mut itoa_buf = itoa::Buffer::new();
    for pos in 0..result.max_read_length {
        let (Some(bases), Some(quals)) = (result.base_row(pos), result.quality_row(pos)) else {
            break;
        };
        writer.write_all(itoa_buf.format(pos + 1).as_bytes())?;
        for count in bases {
            writer.write_all(b"\t")?;
            writer.write_all(itoa_buf.format(*count).as_bytes())?;
        }
        match position_quality(quals) {
            Some((avg, err)) => writeln!(writer, "\t{avg:.2}\t{err:.2}")?,
            None => writer.write_all(b"\t0.0\t0.0\n")?,
        }
    }
    Ok(())
}

/// Mean Phred score and expected error rate of one position
///
/// The error rate is the mean of `10^(-q/10)` over all bases at the position.
/// Returns `None` when no read covers the position.
fn position_quality(row: &QualityRow) -> Option<(f64, f64)> {
    let covered: u64 = row.iter().sum();
    if covered == 0 {
        return None;
    }
    let (sum_q, sum_err) = row
        .iter()
        .enumerate()
        .fold((0u64, 0.0f64), |(sum_q, sum_err), (q, &count)| {
            (
                sum_q + q as u64 * count,
                sum_err + count as f64 * 10f64.powf(-(q as f64) / 10.0),
            )
        });
    let covered = covered as f64;
    Some((sum_q as f64 / covered, sum_err / covered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::MAX_QUAL;

    #[test]
    fn test_report_layout() -> Result<()> {
        let mut result = FqStatisticResult::new();
        result.add_read(b"AAAAA", b"IIIII", 33);
        result.add_read(b"ACGTN", b"!!#$!", 33);

        let mut out = Vec::new();
        write_report(&mut out, &result, "reads.fq", 33)?;
        let text = String::from_utf8(out).expect("report is ASCII");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            &lines[..13],
            &[
                "#Name\treads.fq",
                "#PhredQual\t33",
                "#ReadNum\t2",
                "#MaxReadLength\t5",
                "#BaseCount\t10",
                "#Q20(>=20)\t5\t50.00%",
                "#Q30(>=30)\t5\t50.00%",
                "#A\t6\t60.00%",
                "#C\t1\t10.00%",
                "#G\t1\t10.00%",
                "#T\t1\t10.00%",
                "#N\t1\t10.00%",
                "#GC\t2\t20.00%",
            ]
        );
        assert_eq!(lines[13], "#Pos\tA\tC\tG\tT\tN\tAvgQual\tErrRate");
        // Phred 40 and Phred 0: error rate (0.0001 + 1) / 2
        assert_eq!(lines[14], "1\t2\t0\t0\t0\t0\t20.00\t0.50");
        assert_eq!(lines[15], "2\t1\t1\t0\t0\t0\t20.00\t0.50");
        assert_eq!(lines.len(), 19);
        Ok(())
    }

    #[test]
    fn test_position_quality_zero_coverage() {
        assert!(position_quality(&[0; MAX_QUAL]).is_none());
        let mut row = [0; MAX_QUAL];
        row[10] = 4;
        let (avg, err) = position_quality(&row).expect("covered");
        assert!((avg - 10.0).abs() < 1e-12);
        assert!((err - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_result_writes_nothing() -> Result<()> {
        let mut out = Vec::new();
        write_report(&mut out, &FqStatisticResult::new(), "empty.fq", 33)?;
        assert!(out.is_empty());
        Ok(())
    }
}
