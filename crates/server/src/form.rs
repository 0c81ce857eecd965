//! Single-page prediction form
//!
//! Collects rainfall, temperature and fertilizer and submits them under the
//! short keys below. None of those keys is a training field, so alignment
//! zero-fills every model column and the predictor reports all training
//! fields as missing.

use yield_lib::RawRecord;

pub const RAINFALL_FIELD: &str = "Rainfall";
pub const TEMPERATURE_FIELD: &str = "Temperature";
pub const FERTILIZER_FIELD: &str = "Fertilizer";

const TITLE: &str = "🌾 Crop Yield Prediction System";

/// Raw form submission; values stay strings so bad input can be echoed back
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FormInput {
    #[serde(default)]
    pub rainfall: String,
    #[serde(default)]
    pub temperature: String,
    #[serde(default)]
    pub fertilizer: String,
}

/// Validated form values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormValues {
    pub rainfall: f64,
    pub temperature: f64,
    pub fertilizer: f64,
}

impl FormValues {
    pub fn record(&self) -> RawRecord {
        RawRecord::new()
            .with(RAINFALL_FIELD, self.rainfall)
            .with(TEMPERATURE_FIELD, self.temperature)
            .with(FERTILIZER_FIELD, self.fertilizer)
    }
}

impl FormInput {
    /// Parse all three inputs; each must be a finite number no lower than 0
    pub fn validate(&self) -> Result<FormValues, String> {
        Ok(FormValues {
            rainfall: parse_non_negative("Rainfall (mm)", &self.rainfall)?,
            temperature: parse_non_negative("Temperature (°C)", &self.temperature)?,
            fertilizer: parse_non_negative("Fertilizer Used (kg)", &self.fertilizer)?,
        })
    }
}

fn parse_non_negative(label: &str, raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{label} must be a number"))?;
    if !value.is_finite() {
        return Err(format!("{label} must be a finite number"));
    }
    if value < 0.0 {
        return Err(format!("{label} must be at least 0"));
    }
    Ok(value)
}

/// What to show under the form
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Empty,
    Predicted(f64),
    Error(String),
}

pub fn success_message(predicted_yield: f64) -> String {
    format!("Predicted Yield: {predicted_yield:.2} tons/hectare")
}

pub fn render_page(input: &FormInput, outcome: &Outcome) -> String {
    let result = match outcome {
        Outcome::Empty => String::new(),
        Outcome::Predicted(value) => format!(
            r#"<div class="success">{}</div>"#,
            escape(&success_message(*value))
        ),
        Outcome::Error(message) => format!(r#"<div class="error">{}</div>"#, escape(message)),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 32rem; margin: 2rem auto; }}
label {{ display: block; margin-top: 1rem; }}
input {{ width: 100%; padding: 0.4rem; }}
button {{ margin-top: 1.5rem; padding: 0.5rem 1rem; }}
.success {{ margin-top: 1.5rem; padding: 0.75rem; background: #e6f4ea; color: #1e4620; }}
.error {{ margin-top: 1.5rem; padding: 0.75rem; background: #fdecea; color: #611a15; }}
.note {{ margin-top: 1rem; font-size: 0.85rem; color: #555; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Enter crop details below:</p>
<form method="post" action="/predict">
<label for="rainfall">Rainfall (mm)</label>
<input id="rainfall" name="rainfall" type="number" min="0" step="any" value="{rainfall}">
<label for="temperature">Temperature (°C)</label>
<input id="temperature" name="temperature" type="number" min="0" step="any" value="{temperature}">
<label for="fertilizer">Fertilizer Used (kg)</label>
<input id="fertilizer" name="fertilizer" type="number" min="0" step="any" value="{fertilizer}">
<button type="submit">Predict Yield</button>
</form>
<p class="note">The values are sent as Rainfall, Temperature and Fertilizer.
The model was trained on Rainfall_mm, Temperature_Celsius and a yes/no
Fertilizer_Used flag, so these inputs do not reach it: every model column,
including region, soil, crop and weather, is filled with 0.</p>
{result}
</body>
</html>
"#,
        title = TITLE,
        rainfall = escape(or_zero(&input.rainfall)),
        temperature = escape(or_zero(&input.temperature)),
        fertilizer = escape(or_zero(&input.fertilizer)),
        result = result,
    )
}

fn or_zero(value: &str) -> &str {
    if value.is_empty() {
        "0.0"
    } else {
        value
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
