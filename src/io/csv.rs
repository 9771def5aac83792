//! Tabular readers and writers
//!
//! On disk every table is samples x genes: the first column holds sample
//! identifiers and the header names the remaining columns. Tables are
//! transposed to genes x samples on load.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use ndarray::Array2;

use crate::data::{CellLineDataset, ExpressionMatrix};
use crate::error::{Result, SignatureError};

/// Tab if the header line contains a tab, comma otherwise
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let mut header_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(SignatureError::EmptyData {
            reason: "Empty table file".to_string(),
        });
    }
    Ok(if header_line.contains('\t') { b'\t' } else { b',' })
}

/// Parse one numeric cell; empty, NA and NaN cells are missing values
fn parse_value(field: &str, sample: &str, column: &str) -> Result<f64> {
    match field {
        "" | "NA" | "NaN" | "nan" => Ok(f64::NAN),
        _ => field.parse::<f64>().map_err(|_| SignatureError::InvalidInput {
            reason: format!("Invalid value '{}' for sample '{}', column '{}'", field, sample, column),
        }),
    }
}

/// Header and rows of a samples x columns table
struct RawTable {
    columns: Vec<String>,
    sample_ids: Vec<String>,
    rows: Vec<StringRecord>,
}

fn read_raw_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let delimiter = detect_delimiter(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(SignatureError::InvalidInput {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let columns: Vec<String> = header.iter().skip(1).map(String::from).collect();

    let mut sample_ids = Vec::new();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        sample_ids.push(record[0].to_string());
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(SignatureError::EmptyData {
            reason: format!("No samples found in {}", path.display()),
        });
    }

    Ok(RawTable {
        columns,
        sample_ids,
        rows,
    })
}

/// Fill a samples x genes array from the selected table columns
fn numeric_block(table: &RawTable, column_positions: &[usize]) -> Result<Array2<f64>> {
    let mut values = Array2::zeros((table.rows.len(), column_positions.len()));
    for (i, record) in table.rows.iter().enumerate() {
        for (j, &pos) in column_positions.iter().enumerate() {
            values[[i, j]] = parse_value(&record[pos + 1], &table.sample_ids[i], &table.columns[pos])?;
        }
    }
    Ok(values)
}

fn numeric_column(table: &RawTable, pos: usize) -> Result<Vec<f64>> {
    table
        .rows
        .iter()
        .zip(table.sample_ids.iter())
        .map(|(record, sample)| parse_value(&record[pos + 1], sample, &table.columns[pos]))
        .collect()
}

/// Read an expression table (samples x genes)
/// Expected format: first column is sample IDs, remaining columns are genes
pub fn read_expression_table<P: AsRef<Path>>(path: P) -> Result<ExpressionMatrix> {
    let table = read_raw_table(path)?;
    let positions: Vec<usize> = (0..table.columns.len()).collect();
    let values = numeric_block(&table, &positions)?;
    ExpressionMatrix::from_sample_rows(values, table.sample_ids.clone(), table.columns.clone())
}

/// Read a cell-line table: sample IDs, the response column, an optional AUC
/// column and one column per gene
pub fn read_cell_line_table<P: AsRef<Path>>(
    path: P,
    response_column: &str,
    auc_column: Option<&str>,
) -> Result<CellLineDataset> {
    let table = read_raw_table(path)?;

    let response_pos = table
        .columns
        .iter()
        .position(|c| c == response_column)
        .ok_or_else(|| SignatureError::InvalidInput {
            reason: format!("Response column '{}' not found", response_column),
        })?;
    let auc_pos = match auc_column {
        Some(name) => {
            let pos = table.columns.iter().position(|c| c == name);
            if pos.is_none() {
                log::debug!("AUC column '{}' not present, continuing without AUC", name);
            }
            pos
        }
        None => None,
    };

    let gene_positions: Vec<usize> = (0..table.columns.len())
        .filter(|&p| p != response_pos && Some(p) != auc_pos)
        .collect();
    if gene_positions.is_empty() {
        return Err(SignatureError::EmptyData {
            reason: "Cell-line table has no gene columns".to_string(),
        });
    }

    let response = numeric_column(&table, response_pos)?;
    let auc = auc_pos.map(|p| numeric_column(&table, p)).transpose()?;
    let gene_ids = gene_positions.iter().map(|&p| table.columns[p].clone()).collect();
    let values = numeric_block(&table, &gene_positions)?;

    let expression = ExpressionMatrix::from_sample_rows(values, table.sample_ids.clone(), gene_ids)?;
    CellLineDataset::new(expression, response, auc)
}

/// Read a gene list: one identifier per line, blank lines and `#` comments skipped
pub fn read_gene_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut genes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let gene = line.trim();
        if gene.is_empty() || gene.starts_with('#') {
            continue;
        }
        genes.push(gene.to_string());
    }
    if genes.is_empty() {
        return Err(SignatureError::EmptyData {
            reason: "Gene list is empty".to_string(),
        });
    }
    Ok(genes)
}

/// Write a gene set, one identifier per line, sorted
pub fn write_signature<'a, P, I>(path: P, genes: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a String>,
{
    let mut sorted: Vec<&String> = genes.into_iter().collect();
    sorted.sort();
    let mut file = BufWriter::new(File::create(path)?);
    for gene in sorted {
        writeln!(file, "{}", gene)?;
    }
    file.flush()?;
    Ok(())
}

/// Write per-sample scores as TSV
pub fn write_scores<P: AsRef<Path>>(path: P, sample_ids: &[String], scores: &[f64]) -> Result<()> {
    if sample_ids.len() != scores.len() {
        return Err(SignatureError::DimensionMismatch {
            expected: format!("{} scores", sample_ids.len()),
            got: format!("{} scores", scores.len()),
        });
    }
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["sample_id", "score"])?;
    for (id, score) in sample_ids.iter().zip(scores.iter()) {
        writer.write_record([id.as_str(), format_value(*score).as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", v)
    }
}

/// Write an expression matrix as a samples x genes TSV table
pub fn write_expression_table<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    write_sample_table(path, matrix, &[])
}

/// Write a cell-line dataset as a samples x (response, AUC, genes) TSV table
pub fn write_cell_line_table<P: AsRef<Path>>(
    path: P,
    dataset: &CellLineDataset,
    response_column: &str,
    auc_column: Option<&str>,
) -> Result<()> {
    let mut leading: Vec<(&str, &[f64])> = vec![(response_column, dataset.response())];
    if let (Some(name), Some(auc)) = (auc_column, dataset.auc()) {
        leading.push((name, auc));
    }
    write_sample_table(path, dataset.expression(), &leading)
}

fn write_sample_table<P: AsRef<Path>>(
    path: P,
    matrix: &ExpressionMatrix,
    leading: &[(&str, &[f64])],
) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let mut header = vec!["sample_id".to_string()];
    header.extend(leading.iter().map(|(name, _)| name.to_string()));
    header.extend(matrix.gene_ids().iter().cloned());
    writer.write_record(&header)?;

    for (j, sample) in matrix.sample_ids().iter().enumerate() {
        let mut row = vec![sample.clone()];
        row.extend(leading.iter().map(|(_, values)| format_value(values[j])));
        row.extend(matrix.sample_values(j).iter().map(|&v| format_value(v)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
