//! Fixed binary serialization of a [`LayeredModel`].
//!
//! All integers are big-endian, strings are u32-length-prefixed UTF-8. The
//! layout, in order: model-type tag, learning rate (f64), regularization
//! weight (f64), momentum weight (f64), activation count (i32) and one name
//! per non-input layer, cost name, layer count (i32), then per weight matrix
//! its row count (i32), column count (i32) and row-major f64 values. Layer
//! sizes are never stored; they are reconstructed from the matrix shapes.

use std::io::{self, Read, Write};

use math::Matrix;
use ndarray::Array2;

use crate::{Activation, Cost, LayeredModel, ModelErr, Result};

/// Tag identifying a serialized layered feed-forward model.
pub const MODEL_TYPE: &str = "layered-feedforward";

/// Writes `model` to `out` in the fixed binary layout.
pub fn write_model<W: Write>(model: &LayeredModel, out: &mut W) -> io::Result<()> {
    write_string(out, MODEL_TYPE)?;
    out.write_all(&model.learning_rate.to_be_bytes())?;
    out.write_all(&model.regularization.to_be_bytes())?;
    out.write_all(&model.momentum.to_be_bytes())?;
    out.write_all(&(model.activations.len() as i32).to_be_bytes())?;
    for activation in &model.activations {
        write_string(out, activation.name())?;
    }
    write_string(out, model.cost.name())?;
    out.write_all(&(model.layer_sizes.len() as i32).to_be_bytes())?;
    for matrix in &model.weights {
        write_matrix(out, matrix)?;
    }
    Ok(())
}

/// Reads a model previously written by [`write_model`]. The two are exact
/// inverses.
pub fn read_model<R: Read>(input: &mut R) -> Result<LayeredModel> {
    let tag = read_string(input)?;
    if tag != MODEL_TYPE {
        return Err(corrupt(format!(
            "model type '{tag}' does not match expected '{MODEL_TYPE}'"
        )));
    }
    let learning_rate = read_f64(input)?;
    let regularization = read_f64(input)?;
    let momentum = read_f64(input)?;

    let activation_count = read_count(input, "activation count")?;
    let mut activations = Vec::with_capacity(activation_count);
    for _ in 0..activation_count {
        let name = read_string(input)?;
        activations.push(
            name.parse::<Activation>()
                .map_err(|_| corrupt(format!("unknown activation function '{name}'")))?,
        );
    }

    let cost_name = read_string(input)?;
    let cost = cost_name
        .parse::<Cost>()
        .map_err(|_| corrupt(format!("unknown cost function '{cost_name}'")))?;

    let layer_count = read_count(input, "layer count")?;
    if layer_count < 2 {
        return Err(corrupt(format!("a model needs at least 2 layers, found {layer_count}")));
    }
    if activation_count != layer_count - 1 {
        return Err(corrupt(format!(
            "{activation_count} activation functions do not cover {layer_count} layers"
        )));
    }

    let mut weights = Vec::with_capacity(layer_count - 1);
    for _ in 0..layer_count - 1 {
        weights.push(read_matrix(input)?);
    }

    // layer sizes come back from the matrix shapes alone
    let mut layer_sizes: Vec<usize> = weights.iter().map(Matrix::cols).collect();
    layer_sizes.push(weights[weights.len() - 1].rows());

    let prev_updates = weights.iter().map(Matrix::zeros_like).collect();
    Ok(LayeredModel {
        layer_sizes,
        prev_updates,
        weights,
        activations,
        cost,
        learning_rate,
        momentum,
        regularization,
        output_added: true,
    })
}

/// Serializes into an owned buffer.
pub fn to_bytes(model: &LayeredModel) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_model(model, &mut buf)?;
    Ok(buf)
}

/// Deserializes from a byte slice.
pub fn from_bytes(mut bytes: &[u8]) -> Result<LayeredModel> {
    read_model(&mut bytes)
}

fn write_string<W: Write>(out: &mut W, s: &str) -> io::Result<()> {
    out.write_all(&(s.len() as u32).to_be_bytes())?;
    out.write_all(s.as_bytes())
}

fn write_matrix<W: Write>(out: &mut W, matrix: &Matrix) -> io::Result<()> {
    out.write_all(&(matrix.rows() as i32).to_be_bytes())?;
    out.write_all(&(matrix.cols() as i32).to_be_bytes())?;
    for value in matrix.view().iter() {
        out.write_all(&value.to_be_bytes())?;
    }
    Ok(())
}

fn read_string<R: Read>(input: &mut R) -> Result<String> {
    let mut len = [0u8; 4];
    fill(input, &mut len)?;
    let mut buf = vec![0u8; u32::from_be_bytes(len) as usize];
    fill(input, &mut buf)?;
    String::from_utf8(buf).map_err(|e| corrupt(format!("string is not valid utf-8: {e}")))
}

fn read_f64<R: Read>(input: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    fill(input, &mut buf)?;
    Ok(f64::from_be_bytes(buf))
}

fn read_count<R: Read>(input: &mut R, what: &str) -> Result<usize> {
    let mut buf = [0u8; 4];
    fill(input, &mut buf)?;
    let count = i32::from_be_bytes(buf);
    usize::try_from(count).map_err(|_| corrupt(format!("negative {what} {count}")))
}

fn read_matrix<R: Read>(input: &mut R) -> Result<Matrix> {
    let rows = read_count(input, "matrix row count")?;
    let cols = read_count(input, "matrix column count")?;
    let mut values = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        values.push(read_f64(input)?);
    }
    let data = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| corrupt(format!("matrix shape does not match its data: {e}")))?;
    Ok(Matrix::from_array(data))
}

// A stream that ends before the declared data is a corrupt model, not a
// transport failure.
fn fill<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            corrupt("stream ended before the declared data".into())
        }
        _ => ModelErr::Io(e),
    })
}

fn corrupt(reason: String) -> ModelErr {
    ModelErr::CorruptModel { reason }
}
