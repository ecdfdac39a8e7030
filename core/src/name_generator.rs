//! Deterministic holder names and locations from curated lists.
//!
//! Names carry a gender so demo holders get a consistent `gender` field.

use crate::{
    rng::DemoRng,
    types::{GENDER_FEMALE, GENDER_MALE},
};

pub struct NameGenerator;

/// A generated person: full name plus the gender label it was drawn for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedName {
    pub full_name: String,
    pub gender: &'static str,
}

impl NameGenerator {
    /// First name, two surnames (paternal then maternal).
    pub fn generate_person(rng: &mut DemoRng) -> GeneratedName {
        let female = rng.chance(0.5);
        let (first, gender) = if female {
            (*rng.pick(Self::female_names()), GENDER_FEMALE)
        } else {
            (*rng.pick(Self::male_names()), GENDER_MALE)
        };
        let paternal = *rng.pick(Self::surnames());
        let maternal = *rng.pick(Self::surnames());
        GeneratedName {
            full_name: format!("{first} {paternal} {maternal}"),
            gender,
        }
    }

    pub fn generate_company(rng: &mut DemoRng) -> &'static str {
        *rng.pick(Self::companies())
    }

    /// `(city, state)`.
    pub fn generate_city(rng: &mut DemoRng) -> (&'static str, &'static str) {
        *rng.pick(Self::cities())
    }

    pub fn generate_street(rng: &mut DemoRng) -> String {
        let street = rng.pick(Self::streets());
        let number = rng.between(1, 199);
        format!("{street}, casa {number}")
    }

    fn male_names() -> &'static [&'static str] {
        &[
            "José", "Luis", "Carlos", "Juan", "Miguel", "Pedro", "Jesús", "Rafael",
            "Francisco", "Alejandro", "Andrés", "Daniel", "Manuel", "Ricardo", "Jorge",
            "Eduardo", "Gabriel", "Fernando", "Víctor", "Héctor", "Oscar", "Ramón",
        ]
    }

    fn female_names() -> &'static [&'static str] {
        &[
            "María", "Ana", "Carmen", "Luisa", "Gabriela", "Andrea", "Daniela",
            "Valentina", "Isabel", "Rosa", "Patricia", "Mariana", "Carolina", "Elena",
            "Adriana", "Yolanda", "Beatriz", "Fernanda", "Sofía", "Lucía", "Teresa",
        ]
    }

    fn surnames() -> &'static [&'static str] {
        &[
            "González", "Rodríguez", "Pérez", "Hernández", "García", "Martínez",
            "López", "Sánchez", "Ramírez", "Torres", "Díaz", "Rojas", "Morales",
            "Castillo", "Suárez", "Mendoza", "Silva", "Álvarez", "Romero", "Gutiérrez",
            "Blanco", "Contreras", "Medina", "Vargas", "Marcano", "Bolívar", "Salazar",
        ]
    }

    fn companies() -> &'static [&'static str] {
        &[
            "Seguros Caracas",
            "Mapfre",
            "Mercantil Seguros",
            "Banesco Seguros",
            "Seguros Universitas",
        ]
    }

    fn cities() -> &'static [(&'static str, &'static str)] {
        &[
            ("Valencia", "Carabobo"),
            ("Naguanagua", "Carabobo"),
            ("San Diego", "Carabobo"),
            ("Guacara", "Carabobo"),
            ("Maracay", "Aragua"),
        ]
    }

    fn streets() -> &'static [&'static str] {
        &[
            "Av. Bolívar Norte",
            "Calle Páez",
            "Av. Universidad",
            "Urb. El Viñedo",
            "Av. Cedeño",
            "Calle Colombia",
        ]
    }
}
