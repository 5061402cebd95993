//! Validação de CNPJ/CPF pelo esquema módulo 11 de dígitos verificadores.

const CPF_TAMANHO: usize = 11;
const CNPJ_TAMANHO: usize = 14;

const CNPJ_PESOS_DV1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_PESOS_DV2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

pub fn somente_digitos(entrada: &str) -> String {
    entrada.chars().filter(char::is_ascii_digit).collect()
}

fn digitos(entrada: &str) -> Vec<u32> {
    entrada.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn todos_iguais(digitos: &[u32]) -> bool {
    digitos.iter().all(|&d| d == digitos[0])
}

fn dv_modulo_11(soma: u32) -> u32 {
    let resto = soma % 11;
    if resto < 2 { 0 } else { 11 - resto }
}

/// Valida um CPF (11 dígitos, pontuação ignorada). Sequências de um único
/// dígito repetido têm verificadores formalmente corretos e são rejeitadas.
pub fn validar_cpf(entrada: &str) -> bool {
    let digitos = digitos(&somente_digitos(entrada));
    if digitos.len() != CPF_TAMANHO || todos_iguais(&digitos) {
        return false;
    }

    let soma1: u32 = digitos[..9]
        .iter()
        .zip((2..=10).rev())
        .map(|(d, peso)| d * peso)
        .sum();
    if dv_modulo_11(soma1) != digitos[9] {
        return false;
    }

    let soma2: u32 = digitos[..10]
        .iter()
        .zip((2..=11).rev())
        .map(|(d, peso)| d * peso)
        .sum();
    dv_modulo_11(soma2) == digitos[10]
}

/// Valida um CNPJ (14 dígitos, pontuação ignorada).
pub fn validar_cnpj(entrada: &str) -> bool {
    let digitos = digitos(&somente_digitos(entrada));
    if digitos.len() != CNPJ_TAMANHO || todos_iguais(&digitos) {
        return false;
    }

    let soma1: u32 = digitos[..12]
        .iter()
        .zip(CNPJ_PESOS_DV1)
        .map(|(d, peso)| d * peso)
        .sum();
    if dv_modulo_11(soma1) != digitos[12] {
        return false;
    }

    let soma2: u32 = digitos[..13]
        .iter()
        .zip(CNPJ_PESOS_DV2)
        .map(|(d, peso)| d * peso)
        .sum();
    dv_modulo_11(soma2) == digitos[13]
}

/// Decide pelo tamanho normalizado: 11 dígitos CPF, 14 dígitos CNPJ.
pub fn validar_documento(entrada: &str) -> bool {
    match somente_digitos(entrada).len() {
        CPF_TAMANHO => validar_cpf(entrada),
        CNPJ_TAMANHO => validar_cnpj(entrada),
        _ => false,
    }
}
