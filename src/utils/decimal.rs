use chrono::NaiveDate;
use num_format::Locale;
use rust_decimal::{Decimal, RoundingStrategy};

/// Formata um valor com número fixo de casas decimais na convenção
/// brasileira do layout: vírgula decimal, sem separador de milhar.
pub fn campo_decimal(numero: &Decimal, casas: u32) -> String {
    let arredondado =
        numero.round_dp_with_strategy(casas, RoundingStrategy::MidpointAwayFromZero);
    let mut resultado = format!("{:.prec$}", arredondado, prec = casas as usize);
    if let Some(idx) = resultado.rfind('.') {
        resultado.replace_range(idx..idx + 1, Locale::pt.decimal());
    }

    resultado
}

/// Campos monetários do layout usam duas casas decimais.
pub fn campo_valor(numero: &Decimal) -> String {
    campo_decimal(numero, 2)
}

/// Quantidades usam três casas decimais.
pub fn campo_quantidade(numero: &Decimal) -> String {
    campo_decimal(numero, 3)
}

/// Alíquotas usam duas casas decimais.
pub fn campo_aliquota(numero: &Decimal) -> String {
    campo_decimal(numero, 2)
}

/// Datas no formato fixo DDMMAAAA, sem separadores.
pub fn campo_data(data: &NaiveDate) -> String {
    data.format("%d%m%Y").to_string()
}

/// Campo de data opcional: posição fixa, vazio quando ausente.
pub fn campo_data_opcional(data: Option<&NaiveDate>) -> String {
    data.map(campo_data).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campo_valor_convencao_brasileira() {
        assert_eq!("1000,00", campo_valor(&Decimal::new(1000, 0)));
        assert_eq!("0,00", campo_valor(&Decimal::ZERO));
        assert_eq!("-50,50", campo_valor(&Decimal::new(-505, 1)));
        assert_eq!("23,14", campo_valor(&Decimal::new(2314, 2)));
    }

    #[test]
    fn test_campo_valor_arredondamento() {
        // meio ponto arredonda para longe do zero, convenção monetária
        assert_eq!("10,13", campo_valor(&Decimal::new(10125, 3)));
        assert_eq!("-10,13", campo_valor(&Decimal::new(-10125, 3)));
    }

    #[test]
    fn test_campo_quantidade() {
        assert_eq!("2,000", campo_quantidade(&Decimal::new(2, 0)));
        assert_eq!("0,125", campo_quantidade(&Decimal::new(125, 3)));
    }

    #[test]
    fn test_campo_data() {
        let data = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!("31012026", campo_data(&data));
        assert_eq!("31012026", campo_data_opcional(Some(&data)));
        assert_eq!("", campo_data_opcional(None));
    }
}
