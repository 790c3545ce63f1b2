//! Role-flavoured assistant identities.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::entities::Role;

/// An assistant identity bound to one of the field roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display,
    EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Persona {
    Engineer,
    Drafter,
    Esr,
}

impl Persona {
    /// The persona a role is entitled to, if any.
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Engineer => Some(Persona::Engineer),
            Role::Drafter => Some(Persona::Drafter),
            Role::Esr => Some(Persona::Esr),
            Role::Superadmin | Role::User | Role::Admin => None,
        }
    }

    pub fn assistant_name(self) -> &'static str {
        match self {
            Persona::Engineer => "Asisten Engineer",
            Persona::Drafter => "Asisten Drafter",
            Persona::Esr => "Asisten ESR",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Persona::Engineer => {
                "Anda adalah Asisten Engineer, rekan kerja teknis bagi engineer lapangan. \
                 Jawab dengan bahasa Indonesia yang jelas dan ringkas, sertakan perhitungan, \
                 standar teknis, dan langkah kerja bila relevan. Jika informasi tidak cukup, \
                 sebutkan asumsi yang Anda pakai."
            }
            Persona::Drafter => {
                "Anda adalah Asisten Drafter yang membantu pembuatan gambar kerja dan dokumen \
                 teknis. Fokus pada konvensi penggambaran, penamaan layer, skala, dan \
                 kelengkapan anotasi. Jawab dalam bahasa Indonesia dengan poin-poin yang rapi."
            }
            Persona::Esr => {
                "Anda adalah Asisten ESR yang membantu penyusunan laporan survei dan \
                 dokumentasi lapangan. Bantu merangkum temuan, menyusun kalimat laporan yang \
                 baku, dan memeriksa kelengkapan data. Jawab dalam bahasa Indonesia."
            }
        }
    }
}

const GLOBAL_ASSISTANT_NAME: &str = "Asisten AI";

const GLOBAL_SYSTEM_PROMPT: &str = "Anda adalah Asisten AI internal perusahaan. Jawab pertanyaan \
     umum dengan bahasa Indonesia yang sopan, akurat, dan ringkas. Jika pertanyaan berada di \
     luar pengetahuan Anda, katakan dengan jujur.";

/// Display name for the assistant answering a session (`None` = global).
pub fn assistant_name(persona: Option<Persona>) -> &'static str {
    persona.map_or(GLOBAL_ASSISTANT_NAME, Persona::assistant_name)
}

/// System instruction sent to the provider for a session (`None` = global).
pub fn system_prompt(persona: Option<Persona>) -> &'static str {
    persona.map_or(GLOBAL_SYSTEM_PROMPT, Persona::system_prompt)
}
