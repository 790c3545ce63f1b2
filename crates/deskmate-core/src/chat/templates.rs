//! Canned apologies persisted as the AI turn when a provider call fails.

use crate::ai::ErrorCategory;
use crate::persona::{assistant_name, Persona};

pub fn error_reply(category: ErrorCategory, persona: Option<Persona>) -> String {
    let name = assistant_name(persona);
    match category {
        ErrorCategory::Timeout => format!(
            "Maaf, {name} membutuhkan waktu terlalu lama untuk merespons. \
             Silakan coba lagi dalam beberapa saat atau persingkat pertanyaan Anda."
        ),
        ErrorCategory::ApiFailure => format!(
            "Maaf, {name} sedang mengalami gangguan saat menghubungi layanan AI. \
             Silakan coba lagi nanti."
        ),
        ErrorCategory::ImageProcessing => format!(
            "Maaf, {name} tidak dapat memproses gambar yang Anda kirim. \
             Pastikan gambar dapat diakses dan berformat JPG, PNG, GIF, atau WEBP."
        ),
        ErrorCategory::TokenLimit => format!(
            "Maaf, percakapan ini terlalu panjang untuk diproses oleh {name}. \
             Silakan mulai sesi chat baru atau persingkat pesan Anda."
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replies_name_the_assistant() {
        assert!(error_reply(ErrorCategory::Timeout, None).contains("Asisten AI"));
        assert!(error_reply(ErrorCategory::TokenLimit, Some(Persona::Esr)).contains("Asisten ESR"));
        assert!(error_reply(ErrorCategory::ImageProcessing, Some(Persona::Drafter)).contains("gambar"));
    }
}
