use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type Participantes = Vec<Participante>;
pub type Produtos = Vec<Produto>;
pub type DocumentosFiscais = Vec<DocumentoFiscal>;

pub const BRASIL_COD_PAIS: &str = "1058";

/// Sentido da operação do documento fiscal, campo IND_OPER do layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum TipoOperacao {
    Entrada,
    Saida,
}

impl TipoOperacao {
    pub fn indicador(&self) -> &'static str {
        match self {
            TipoOperacao::Entrada => "0",
            TipoOperacao::Saida => "1",
        }
    }
}

impl From<&str> for TipoOperacao {
    fn from(item: &str) -> Self {
        let c = item.chars().next().unwrap();
        match c {
            '0' | 'e' | 'E' => TipoOperacao::Entrada,
            '1' | 's' | 'S' => TipoOperacao::Saida,
            _ => unimplemented!("no other fiscal operations supported"),
        }
    }
}

/// Identificação fiscal da empresa e período de apuração.
///
/// Os campos de identidade (`cnpj`, `ie`, `uf`) são obrigatórios; a geração
/// falha antes de montar qualquer registro quando algum deles está vazio.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SpedConfig {
    pub periodo_inicio: NaiveDate,
    pub periodo_fim: NaiveDate,
    pub cnpj: String,
    pub ie: String,
    pub razao_social: String,
    pub uf: String,
    /// Código IBGE do município.
    pub cod_mun: String,
    /// Finalidade do arquivo: 0 remessa original, 1 substituto.
    pub cod_fin: String,
    /// Perfil de enquadramento (A, B ou C).
    pub ind_perfil: String,
    /// Tipo de atividade: 0 industrial, 1 outros.
    pub ind_ativ: String,
}

impl SpedConfig {
    pub fn campos_fiscais_vazios(&self) -> Vec<&'static str> {
        let mut vazios = vec![];
        if self.cnpj.trim().is_empty() {
            vazios.push("CNPJ");
        }
        if self.ie.trim().is_empty() {
            vazios.push("inscrição estadual");
        }
        if self.uf.trim().is_empty() {
            vazios.push("UF");
        }
        vazios
    }
}

/// Participante (fornecedor ou cliente) referenciado pelos documentos do
/// período. O `codigo` é sintético e estável dentro do arquivo ("F{n}" para
/// fornecedores, "C{n}" para clientes).
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Participante {
    pub codigo: String,
    pub nome: String,
    pub cod_pais: String,
    /// CNPJ ou CPF, somente dígitos.
    pub documento: String,
    pub ie: String,
    pub cod_mun: String,
    pub endereco: String,
    pub numero: String,
    pub bairro: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Produto {
    pub codigo: String,
    pub descricao: String,
    pub cod_barras: Option<String>,
    pub unidade: String,
    /// Tipo do item conforme tabela do layout (00 mercadoria para revenda,
    /// 04 produto acabado, ...).
    pub tipo_item: String,
    pub ncm: Option<String>,
    pub aliquota_icms: Decimal,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Unidade {
    pub codigo: String,
    pub descricao: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ItemDocumento {
    pub produto: String,
    pub quantidade: Decimal,
    pub unidade: String,
    pub valor_unitario: Decimal,
    pub valor_total: Decimal,
    pub desconto: Decimal,
    pub cfop: String,
    pub cst_icms: String,
    pub base_icms: Decimal,
    pub aliquota_icms: Decimal,
    pub valor_icms: Decimal,
    pub valor_ipi: Decimal,
    pub valor_pis: Decimal,
    pub valor_cofins: Decimal,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DocumentoFiscal {
    pub operacao: TipoOperacao,
    /// Modelo do documento (55 NF-e, 65 NFC-e, 57 CT-e, ...).
    pub modelo: String,
    pub serie: String,
    pub numero: String,
    /// Chave de acesso de 44 dígitos, quando o documento é eletrônico.
    pub chave: Option<String>,
    pub data_emissao: NaiveDate,
    pub data_entrada_saida: Option<NaiveDate>,
    /// Código sintético do participante, chave estrangeira para o 0150.
    pub participante: String,
    pub valor_total: Decimal,
    pub desconto: Decimal,
    pub frete: Decimal,
    pub valor_produtos: Decimal,
    pub base_icms: Decimal,
    pub valor_icms: Decimal,
    pub valor_ipi: Decimal,
    pub valor_pis: Decimal,
    pub valor_cofins: Decimal,
    pub itens: Vec<ItemDocumento>,
}

impl DocumentoFiscal {
    /// Modelos de transporte escrituram no bloco D, os demais no bloco C.
    pub fn bloco_d(&self) -> bool {
        matches!(self.modelo.as_str(), "07" | "08" | "09" | "57" | "67")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ItemInventario {
    pub produto: String,
    pub unidade: String,
    pub quantidade: Decimal,
    pub valor_unitario: Decimal,
    pub valor_total: Decimal,
    /// Indicador de propriedade: 0 próprio em poder da empresa,
    /// 1 próprio em poder de terceiros, 2 de terceiros.
    pub ind_propriedade: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Inventario {
    pub data: NaiveDate,
    /// Motivo legal do inventário: 01 final de período, 02 mudança de
    /// tributação, ...
    pub motivo: String,
    pub itens: Vec<ItemInventario>,
}

/// Coleções já materializadas consumidas por uma geração. O encoder não
/// consulta armazenamento: recebe tudo pronto e pré-filtrado pelo período.
#[derive(Clone, Debug, PartialEq)]
pub struct EfdInput {
    pub config: SpedConfig,
    pub participantes: Participantes,
    pub produtos: Produtos,
    pub documentos_entrada: DocumentosFiscais,
    pub documentos_saida: DocumentosFiscais,
    pub inventario: Option<Inventario>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RelatorioValidacao {
    pub valido: bool,
    pub erros: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpedResult {
    pub conteudo: String,
    pub nome_arquivo: String,
    pub validacao: RelatorioValidacao,
}

impl SpedResult {
    /// Conteúdo no encoding de entrega do arquivo (Windows-1252).
    pub fn conteudo_bytes(&self) -> Vec<u8> {
        encoding_rs::WINDOWS_1252.encode(&self.conteudo).0.to_vec()
    }
}

/// Competência (ano/mês) com pelo menos um documento fiscal emitido.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
pub struct Periodo {
    pub ano: i32,
    pub mes: u32,
}

/// Competências distintas presentes em `documentos`, ordenadas da mais
/// recente para a mais antiga.
pub fn listar_periodos_disponiveis(documentos: &[DocumentoFiscal]) -> Vec<Periodo> {
    let distintos: BTreeSet<(i32, u32)> = documentos
        .iter()
        .map(|d| (d.data_emissao.year(), d.data_emissao.month()))
        .collect();

    distintos
        .into_iter()
        .rev()
        .map(|(ano, mes)| Periodo { ano, mes })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documento(data: NaiveDate) -> DocumentoFiscal {
        DocumentoFiscal {
            operacao: TipoOperacao::Saida,
            modelo: "55".to_string(),
            serie: "1".to_string(),
            numero: "1".to_string(),
            chave: None,
            data_emissao: data,
            data_entrada_saida: None,
            participante: "C1".to_string(),
            valor_total: Decimal::ZERO,
            desconto: Decimal::ZERO,
            frete: Decimal::ZERO,
            valor_produtos: Decimal::ZERO,
            base_icms: Decimal::ZERO,
            valor_icms: Decimal::ZERO,
            valor_ipi: Decimal::ZERO,
            valor_pis: Decimal::ZERO,
            valor_cofins: Decimal::ZERO,
            itens: vec![],
        }
    }

    #[test]
    fn test_listar_periodos_ordenacao_descendente() {
        let docs = vec![
            documento(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap()),
            documento(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
            documento(NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()),
        ];

        let periodos = listar_periodos_disponiveis(&docs);
        assert_eq!(
            periodos,
            vec![
                Periodo { ano: 2026, mes: 3 },
                Periodo { ano: 2026, mes: 1 },
                Periodo { ano: 2025, mes: 12 },
            ]
        );
    }

    #[test]
    fn test_listar_periodos_deduplica_competencia() {
        let docs = vec![
            documento(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
            documento(NaiveDate::from_ymd_opt(2026, 1, 28).unwrap()),
        ];

        assert_eq!(
            listar_periodos_disponiveis(&docs),
            vec![Periodo { ano: 2026, mes: 1 }]
        );
    }

    #[test]
    fn test_tipo_operacao_from_str() {
        assert_eq!(TipoOperacao::from("entrada"), TipoOperacao::Entrada);
        assert_eq!(TipoOperacao::from("1"), TipoOperacao::Saida);
        assert_eq!(TipoOperacao::Entrada.indicador(), "0");
    }

    #[test]
    fn test_campos_fiscais_vazios() {
        let config = SpedConfig {
            periodo_inicio: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            periodo_fim: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            cnpj: "11222333000181".to_string(),
            ie: "".to_string(),
            razao_social: "Indústria Exemplo Ltda".to_string(),
            uf: " ".to_string(),
            cod_mun: "3550308".to_string(),
            cod_fin: "0".to_string(),
            ind_perfil: "A".to_string(),
            ind_ativ: "0".to_string(),
        };

        assert_eq!(
            config.campos_fiscais_vazios(),
            vec!["inscrição estadual", "UF"]
        );
    }
}
