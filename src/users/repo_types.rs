use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchingFor {
    SugarBaby,
    SugarMommy,
    SugarDaddy,
    SugarBoy,
}

impl SearchingFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchingFor::SugarBaby => "sugar_baby",
            SearchingFor::SugarMommy => "sugar_mommy",
            SearchingFor::SugarDaddy => "sugar_daddy",
            SearchingFor::SugarBoy => "sugar_boy",
        }
    }
}

impl FromStr for SearchingFor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sugar_baby" => Ok(SearchingFor::SugarBaby),
            "sugar_mommy" => Ok(SearchingFor::SugarMommy),
            "sugar_daddy" => Ok(SearchingFor::SugarDaddy),
            "sugar_boy" => Ok(SearchingFor::SugarBoy),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SearchingFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved place. `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub coordinates: [f64; 2],
}

/// User record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub dob: Date,
    pub gender: Gender,
    pub location: Location,
    pub searching_for: SearchingFor,
    pub found_at: Option<String>,
    pub prelaunch: Option<bool>,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_code: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Everything needed to insert a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub dob: Date,
    pub gender: Gender,
    pub location: Location,
    pub searching_for: SearchingFor,
    pub found_at: Option<String>,
    pub prelaunch: Option<bool>,
    pub email_verification_code: String,
}

/// Flat row shape of the `users` table.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub dob: Date,
    pub gender: String,
    pub location_city: String,
    pub location_country: String,
    pub longitude: f64,
    pub latitude: f64,
    pub searching_for: String,
    pub found_at: Option<String>,
    pub prelaunch: Option<bool>,
    pub email_verified: bool,
    pub email_verification_code: Option<String>,
    pub reset_password_code: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let gender = row
            .gender
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown gender {:?} for user {}", row.gender, row.id))?;
        let searching_for = row.searching_for.parse().map_err(|_| {
            anyhow::anyhow!(
                "unknown searching_for {:?} for user {}",
                row.searching_for,
                row.id
            )
        })?;
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            dob: row.dob,
            gender,
            location: Location {
                city: row.location_city,
                country: row.location_country,
                coordinates: [row.longitude, row.latitude],
            },
            searching_for,
            found_at: row.found_at,
            prelaunch: row.prelaunch,
            email_verified: row.email_verified,
            email_verification_code: row.email_verification_code,
            reset_password_code: row.reset_password_code,
            created_at: row.created_at,
        })
    }
}
