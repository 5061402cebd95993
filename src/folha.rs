//! Cálculos de folha de pagamento: INSS e IRRF progressivos, FGTS e os
//! adicionais da CLT (hora extra, adicional noturno, insalubridade).
//!
//! Tabelas vigentes do exercício de 2025. Todos os cálculos retornam
//! valores arredondados a duas casas, meio ponto para longe do zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Faixas progressivas do INSS: (teto da faixa, alíquota).
const INSS_FAIXAS: [(Decimal, Decimal); 4] = [
    (Decimal::from_parts(151800, 0, 0, false, 2), Decimal::from_parts(75, 0, 0, false, 3)),
    (Decimal::from_parts(279388, 0, 0, false, 2), Decimal::from_parts(9, 0, 0, false, 2)),
    (Decimal::from_parts(419083, 0, 0, false, 2), Decimal::from_parts(12, 0, 0, false, 2)),
    (Decimal::from_parts(815741, 0, 0, false, 2), Decimal::from_parts(14, 0, 0, false, 2)),
];

/// Faixas do IRRF mensal: (teto da faixa, alíquota, parcela a deduzir).
const IRRF_FAIXAS: [(Decimal, Decimal, Decimal); 5] = [
    (
        Decimal::from_parts(225920, 0, 0, false, 2),
        Decimal::ZERO,
        Decimal::ZERO,
    ),
    (
        Decimal::from_parts(282665, 0, 0, false, 2),
        Decimal::from_parts(75, 0, 0, false, 3),
        Decimal::from_parts(16944, 0, 0, false, 2),
    ),
    (
        Decimal::from_parts(375105, 0, 0, false, 2),
        Decimal::from_parts(15, 0, 0, false, 2),
        Decimal::from_parts(38144, 0, 0, false, 2),
    ),
    (
        Decimal::from_parts(466468, 0, 0, false, 2),
        Decimal::from_parts(225, 0, 0, false, 3),
        Decimal::from_parts(66277, 0, 0, false, 2),
    ),
    (
        Decimal::MAX,
        Decimal::from_parts(275, 0, 0, false, 3),
        Decimal::from_parts(89600, 0, 0, false, 2),
    ),
];

/// Dedução mensal por dependente na base do IRRF.
const IRRF_DEDUCAO_DEPENDENTE: Decimal = Decimal::from_parts(18959, 0, 0, false, 2);

const FGTS_ALIQUOTA: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Divisor de horas do salário mensal (220 horas).
const HORAS_MENSAIS: Decimal = Decimal::from_parts(220, 0, 0, false, 0);

const ADICIONAL_NOTURNO: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

const SALARIO_MINIMO: Decimal = Decimal::from_parts(151800, 0, 0, false, 2);

const CEM: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Grau de insalubridade da NR-15.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum GrauInsalubridade {
    Minimo,
    Medio,
    Maximo,
}

impl GrauInsalubridade {
    fn percentual(&self) -> Decimal {
        match self {
            GrauInsalubridade::Minimo => Decimal::from_parts(10, 0, 0, false, 2),
            GrauInsalubridade::Medio => Decimal::from_parts(20, 0, 0, false, 2),
            GrauInsalubridade::Maximo => Decimal::from_parts(40, 0, 0, false, 2),
        }
    }
}

fn arredondar(valor: Decimal) -> Decimal {
    valor.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Contribuição previdenciária progressiva: cada faixa tributa somente a
/// parcela do salário que lhe cabe, com teto na última faixa.
pub fn calcular_inss(salario: &Decimal) -> Decimal {
    let mut contribuicao = Decimal::ZERO;
    let mut piso = Decimal::ZERO;

    for (teto, aliquota) in INSS_FAIXAS {
        if *salario <= piso {
            break;
        }
        let tributavel = salario.min(&teto) - piso;
        contribuicao += tributavel * aliquota;
        piso = teto;
    }

    arredondar(contribuicao)
}

/// IRRF mensal sobre a base salário menos INSS menos dedução por
/// dependente, pela tabela de alíquota marginal com parcela a deduzir.
pub fn calcular_irrf(salario: &Decimal, dependentes: u32) -> Decimal {
    let base = salario
        - calcular_inss(salario)
        - IRRF_DEDUCAO_DEPENDENTE * Decimal::from(dependentes);

    for (teto, aliquota, parcela) in IRRF_FAIXAS {
        if base <= teto {
            let imposto = base * aliquota - parcela;
            return arredondar(imposto.max(Decimal::ZERO));
        }
    }

    unreachable!("a última faixa do IRRF não tem teto");
}

pub fn calcular_fgts(salario: &Decimal) -> Decimal {
    arredondar(salario * FGTS_ALIQUOTA)
}

/// Valor da hora normal de trabalho do salário mensal.
pub fn valor_hora(salario: &Decimal) -> Decimal {
    arredondar(salario / HORAS_MENSAIS)
}

/// Horas extras com o adicional percentual acordado (50 = 50%, mínimo
/// constitucional).
pub fn calcular_hora_extra(salario: &Decimal, horas: &Decimal, adicional: &Decimal) -> Decimal {
    let hora = salario / HORAS_MENSAIS;
    arredondar(hora * (Decimal::ONE + adicional / CEM) * horas)
}

/// Adicional noturno de 20% sobre a hora normal, pago por hora trabalhada
/// no período noturno.
pub fn calcular_adicional_noturno(salario: &Decimal, horas: &Decimal) -> Decimal {
    let hora = salario / HORAS_MENSAIS;
    arredondar(hora * ADICIONAL_NOTURNO * horas)
}

/// Adicional de insalubridade: percentual do salário mínimo conforme o
/// grau de exposição.
pub fn calcular_insalubridade(grau: GrauInsalubridade) -> Decimal {
    arredondar(SALARIO_MINIMO * grau.percentual())
}
