//! Derived patient fields, computed at read time and never stored.
//!
//! Free functions over plain values so they can be exercised without a
//! database. [`PatientRecord::from_patient`] is the single call site,
//! which keeps every surfaced patient consistent.
//!
//! [`PatientRecord::from_patient`]: crate::models::PatientRecord::from_patient

use chrono::{Datelike, NaiveDate};

use crate::models::enums::BmiCategory;

/// Body-mass index from weight (kg) and height (cm), rounded to one
/// decimal place. Undefined unless both inputs are positive.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if weight_kg > 0.0 && height_cm > 0.0 {
        let meters = height_cm / 100.0;
        Some((weight_kg / (meters * meters) * 10.0).round() / 10.0)
    } else {
        None
    }
}

/// Category for a BMI value: <18.5 underweight, <25 normal, <30 overweight.
pub fn bmi_category(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

/// Age on `today`, preferring the birth date over the stored age.
///
/// Whole years since the birth date, minus one when this year's birthday
/// has not yet been reached. Falls back to the stored age when no birth
/// date is known.
pub fn effective_age(
    birth_date: Option<NaiveDate>,
    stored_age: Option<i32>,
    today: NaiveDate,
) -> Option<i32> {
    match birth_date {
        Some(dob) => {
            let mut age = today.year() - dob.year();
            if (today.month(), today.day()) < (dob.month(), dob.day()) {
                age -= 1;
            }
            Some(age)
        }
        None => stored_age,
    }
}

pub fn full_name(first: &str, last: &str) -> String {
    format!("{first} {last}")
}
