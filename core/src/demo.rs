//! Deterministic demo holders for local runs and tests.

use crate::{
    holder::NewHolder,
    name_generator::NameGenerator,
    rng::{DemoRng, StreamSlot},
    store::UserRow,
    types::{PolicyStatus, DATE_FORMAT},
};
use chrono::{Duration, NaiveDate};

/// Status mix for generated policies; mostly active.
const STATUS_CYCLE: [PolicyStatus; 8] = [
    PolicyStatus::Activo,
    PolicyStatus::Activo,
    PolicyStatus::Activo,
    PolicyStatus::Activo,
    PolicyStatus::Activo,
    PolicyStatus::Vencido,
    PolicyStatus::Inactivo,
    PolicyStatus::Suspendido,
];

const POLICY_TYPES: [&str; 3] = ["Individual", "Familiar", "Colectivo"];
const COVERAGE_TYPES: [&str; 3] = ["Básica", "Amplia", "Premium"];
const BLOOD_TYPES: [&str; 6] = ["O+", "O-", "A+", "A-", "B+", "AB+"];

/// `n` holders derived from `seed`. Same inputs, same output.
pub fn generate(seed: u64, n: usize, today: NaiveDate) -> Vec<NewHolder> {
    let mut identity = DemoRng::new(seed, StreamSlot::Identity);
    let mut policy = DemoRng::new(seed, StreamSlot::Policy);
    let mut contact = DemoRng::new(seed, StreamSlot::Contact);

    (0..n)
        .map(|i| {
            let person = NameGenerator::generate_person(&mut identity);
            let ci = format!("V-{}", 8_000_000 + seed % 1_000 * 10_000 + i as u64);
            let birth = today - Duration::days(identity.between(18 * 365, 80 * 365));

            let start = today - Duration::days(policy.between(0, 700));
            let end = start + Duration::days(365);
            let status = STATUS_CYCLE[i % STATUS_CYCLE.len()];
            let max_coverage = policy.between(5, 100) as f64 * 1_000.0;

            let (city, state) = NameGenerator::generate_city(&mut contact);
            let phone = format!("0414-{:07}", contact.below(10_000_000));
            let email = contact
                .chance(0.8)
                .then(|| format!("titular{}@correo.example", i + 1));

            NewHolder {
                ci: Some(ci),
                name: Some(person.full_name),
                phone: Some(phone),
                email,
                birth_date: Some(birth.format(DATE_FORMAT).to_string()),
                gender: Some(person.gender.to_string()),
                address: Some(NameGenerator::generate_street(&mut contact)),
                city: Some(city.to_string()),
                state: Some(state.to_string()),
                insurance_company: Some(NameGenerator::generate_company(&mut policy).to_string()),
                policy_number: Some(format!("POL-{:06}", 100_000 + i)),
                policy_type: Some(policy.pick(&POLICY_TYPES).to_string()),
                policy_status: Some(status.as_str().to_string()),
                policy_start_date: Some(start.format(DATE_FORMAT).to_string()),
                policy_end_date: Some(end.format(DATE_FORMAT).to_string()),
                coverage_type: Some(policy.pick(&COVERAGE_TYPES).to_string()),
                max_coverage_amount: Some(max_coverage),
                blood_type: Some(contact.pick(&BLOOD_TYPES).to_string()),
                create_as_patient: Some(true),
                ..NewHolder::default()
            }
        })
        .collect()
}

/// Dashboard users for a demo database, one per known role.
pub fn users() -> Vec<UserRow> {
    [
        ("demo-super", "super@demo.example", "Superusuario"),
        ("demo-coord", "coordinador@demo.example", "Coordinador Regional"),
        ("demo-admin", "admin@demo.example", "Administrador"),
        ("demo-analyst", "analista@demo.example", "Analista"),
        ("demo-auditor", "auditor@demo.example", "Médico Auditor"),
    ]
    .into_iter()
    .map(|(id, email, role)| UserRow {
        id: id.to_string(),
        email: email.to_string(),
        name: role.to_string(),
        role: role.to_string(),
        is_active: true,
    })
    .collect()
}
