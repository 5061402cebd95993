use crate::data::{
    DocumentoFiscal, EfdInput, Inventario, ItemDocumento, ItemInventario, Participante, Produto,
    SpedConfig, SpedResult, TipoOperacao, Unidade,
};
use crate::parsers::efd::validar;
use crate::utils::decimal::{
    campo_aliquota, campo_data, campo_data_opcional, campo_quantidade, campo_valor,
};
use crate::utils::documento::somente_digitos;
use anyhow::{Result, bail};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/*
   Escrituração Fiscal Digital - EFD ICMS/IPI, Guia Prático da EFD.
   http://sped.rfb.gov.br/projeto/show/273

   Registros escriturados por este gerador, campos delimitados por pipe com
   pipe inicial e final:

   0000 abertura do arquivo: versão do layout, finalidade, período,
        razão social, CNPJ, CPF, UF, IE, município, IM, SUFRAMA, perfil,
        atividade
   0001 abertura do bloco 0 (indicador de movimento)
   0150 participante: código, nome, país, CNPJ, CPF, IE, município,
        SUFRAMA, endereço, número, complemento, bairro
   0190 unidade de medida: código, descrição
   0200 produto: código, descrição, código de barras, código anterior,
        unidade de inventário, tipo do item, NCM, EX IPI, gênero,
        serviço LST, alíquota de ICMS
   0990 encerramento do bloco 0 (quantidade de linhas)
   C001/C100/C170/C990 documentos de mercadorias (NF-e, NFC-e): cabeçalho
        por documento e um item por linha, numeração posicional
   D001/D100/D190/D990 documentos de transporte (CT-e e modelos afins),
        mesma estrutura cabeçalho + itens
   H001/H005/H010/H990 inventário físico: totalizador com data e motivo
        legal, uma linha por item com estoque positivo
   9001/9900/9990/9999 bloco de controle: um 9900 por tipo de registro
        presente no arquivo (inclusive os do próprio bloco 9), total de
        linhas do bloco 9 e total de linhas do arquivo
*/
const VERSAO_LAYOUT: &str = "017";
const SEM_MOVIMENTO: &str = "1";
const COM_MOVIMENTO: &str = "0";
/// COD_SIT 00, documento regular.
const SITUACAO_REGULAR: &str = "00";
const CNPJ_TAMANHO: usize = 14;

/// Conjunto fechado dos tipos de registro emitidos pelo gerador.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Registro {
    R0000,
    R0001,
    R0150,
    R0190,
    R0200,
    R0990,
    RC001,
    RC100,
    RC170,
    RC990,
    RD001,
    RD100,
    RD190,
    RD990,
    RH001,
    RH005,
    RH010,
    RH990,
    R9001,
    R9900,
    R9990,
    R9999,
}

impl Registro {
    pub fn codigo(&self) -> &'static str {
        match self {
            Registro::R0000 => "0000",
            Registro::R0001 => "0001",
            Registro::R0150 => "0150",
            Registro::R0190 => "0190",
            Registro::R0200 => "0200",
            Registro::R0990 => "0990",
            Registro::RC001 => "C001",
            Registro::RC100 => "C100",
            Registro::RC170 => "C170",
            Registro::RC990 => "C990",
            Registro::RD001 => "D001",
            Registro::RD100 => "D100",
            Registro::RD190 => "D190",
            Registro::RD990 => "D990",
            Registro::RH001 => "H001",
            Registro::RH005 => "H005",
            Registro::RH010 => "H010",
            Registro::RH990 => "H990",
            Registro::R9001 => "9001",
            Registro::R9900 => "9900",
            Registro::R9990 => "9990",
            Registro::R9999 => "9999",
        }
    }
}

fn registro_0000(config: &SpedConfig) -> Vec<String> {
    vec![
        Registro::R0000.codigo().to_string(),
        VERSAO_LAYOUT.to_string(),
        config.cod_fin.clone(),
        campo_data(&config.periodo_inicio),
        campo_data(&config.periodo_fim),
        config.razao_social.clone(),
        somente_digitos(&config.cnpj),
        String::new(), // CPF, pessoa jurídica não preenche
        config.uf.clone(),
        config.ie.clone(),
        config.cod_mun.clone(),
        String::new(), // inscrição municipal
        String::new(), // SUFRAMA
        config.ind_perfil.clone(),
        config.ind_ativ.clone(),
    ]
}

fn registro_abertura_bloco(registro: Registro, com_dados: bool) -> Vec<String> {
    let indicador = if com_dados {
        COM_MOVIMENTO
    } else {
        SEM_MOVIMENTO
    };
    vec![registro.codigo().to_string(), indicador.to_string()]
}

fn registro_encerramento_bloco(registro: Registro, linhas: usize) -> Vec<String> {
    vec![registro.codigo().to_string(), linhas.to_string()]
}

fn registro_0150(participante: &Participante) -> Vec<String> {
    let documento = somente_digitos(&participante.documento);
    let (cnpj, cpf) = if documento.len() == CNPJ_TAMANHO {
        (documento, String::new())
    } else {
        (String::new(), documento)
    };

    vec![
        Registro::R0150.codigo().to_string(),
        participante.codigo.clone(),
        participante.nome.clone(),
        participante.cod_pais.clone(),
        cnpj,
        cpf,
        participante.ie.clone(),
        participante.cod_mun.clone(),
        String::new(), // SUFRAMA
        participante.endereco.clone(),
        participante.numero.clone(),
        String::new(), // complemento
        participante.bairro.clone(),
    ]
}

fn registro_0190(unidade: &Unidade) -> Vec<String> {
    vec![
        Registro::R0190.codigo().to_string(),
        unidade.codigo.clone(),
        unidade.descricao.clone(),
    ]
}

fn registro_0200(produto: &Produto) -> Vec<String> {
    vec![
        Registro::R0200.codigo().to_string(),
        produto.codigo.clone(),
        produto.descricao.clone(),
        produto.cod_barras.clone().unwrap_or_default(),
        String::new(), // código anterior do item
        produto.unidade.clone(),
        produto.tipo_item.clone(),
        produto.ncm.clone().unwrap_or_default(),
        String::new(), // EX da TIPI
        String::new(), // gênero do item
        String::new(), // código de serviço LST
        campo_aliquota(&produto.aliquota_icms),
    ]
}

fn registro_c100(documento: &DocumentoFiscal) -> Vec<String> {
    vec![
        Registro::RC100.codigo().to_string(),
        documento.operacao.indicador().to_string(),
        indicador_emitente(documento.operacao).to_string(),
        documento.participante.clone(),
        documento.modelo.clone(),
        SITUACAO_REGULAR.to_string(),
        documento.serie.clone(),
        documento.numero.clone(),
        documento.chave.clone().unwrap_or_default(),
        campo_data(&documento.data_emissao),
        campo_data_opcional(documento.data_entrada_saida.as_ref()),
        campo_valor(&documento.valor_total),
        String::new(), // indicador de pagamento
        campo_valor(&documento.desconto),
        campo_valor(&Decimal::ZERO), // abatimento não tributado
        campo_valor(&documento.valor_produtos),
        String::new(), // indicador de frete
        campo_valor(&documento.frete),
        campo_valor(&Decimal::ZERO), // seguro
        campo_valor(&Decimal::ZERO), // outras despesas
        campo_valor(&documento.base_icms),
        campo_valor(&documento.valor_icms),
        campo_valor(&Decimal::ZERO), // base ICMS ST
        campo_valor(&Decimal::ZERO), // ICMS ST
        campo_valor(&documento.valor_ipi),
        campo_valor(&documento.valor_pis),
        campo_valor(&documento.valor_cofins),
    ]
}

/// Item de documento do bloco C. `numero_item` é posicional, base 1,
/// seguindo a ordem original da lista de itens.
fn registro_c170(numero_item: usize, item: &ItemDocumento) -> Vec<String> {
    vec![
        Registro::RC170.codigo().to_string(),
        numero_item.to_string(),
        item.produto.clone(),
        String::new(), // descrição complementar
        campo_quantidade(&item.quantidade),
        item.unidade.clone(),
        campo_valor(&item.valor_total),
        campo_valor(&item.desconto),
        item.cst_icms.clone(),
        item.cfop.clone(),
        campo_valor(&item.base_icms),
        campo_aliquota(&item.aliquota_icms),
        campo_valor(&item.valor_icms),
        campo_valor(&item.valor_ipi),
        campo_valor(&item.valor_pis),
        campo_valor(&item.valor_cofins),
    ]
}

fn registro_d100(documento: &DocumentoFiscal) -> Vec<String> {
    vec![
        Registro::RD100.codigo().to_string(),
        documento.operacao.indicador().to_string(),
        indicador_emitente(documento.operacao).to_string(),
        documento.participante.clone(),
        documento.modelo.clone(),
        SITUACAO_REGULAR.to_string(),
        documento.serie.clone(),
        documento.numero.clone(),
        documento.chave.clone().unwrap_or_default(),
        campo_data(&documento.data_emissao),
        campo_data_opcional(documento.data_entrada_saida.as_ref()),
        campo_valor(&documento.valor_total),
        campo_valor(&documento.desconto),
        campo_valor(&documento.base_icms),
        campo_valor(&documento.valor_icms),
    ]
}

fn registro_d190(numero_item: usize, item: &ItemDocumento) -> Vec<String> {
    vec![
        Registro::RD190.codigo().to_string(),
        numero_item.to_string(),
        item.cst_icms.clone(),
        item.cfop.clone(),
        campo_aliquota(&item.aliquota_icms),
        campo_valor(&item.valor_total),
        campo_valor(&item.base_icms),
        campo_valor(&item.valor_icms),
    ]
}

fn registro_h005(inventario: &Inventario, total: &Decimal) -> Vec<String> {
    vec![
        Registro::RH005.codigo().to_string(),
        campo_data(&inventario.data),
        campo_valor(total),
        inventario.motivo.clone(),
    ]
}

fn registro_h010(item: &ItemInventario) -> Vec<String> {
    vec![
        Registro::RH010.codigo().to_string(),
        item.produto.clone(),
        item.unidade.clone(),
        campo_quantidade(&item.quantidade),
        campo_valor(&item.valor_unitario),
        campo_valor(&item.valor_total),
        item.ind_propriedade.clone(),
        String::new(), // participante dono, somente propriedade 1 e 2
    ]
}

fn registro_9900(codigo: &str, ocorrencias: usize) -> Vec<String> {
    vec![
        Registro::R9900.codigo().to_string(),
        codigo.to_string(),
        ocorrencias.to_string(),
    ]
}

fn indicador_emitente(operacao: TipoOperacao) -> &'static str {
    match operacao {
        // entrada escritura documento de emissão de terceiros
        TipoOperacao::Entrada => "1",
        TipoOperacao::Saida => "0",
    }
}

/// Monta os registros na ordem de blocos do layout mantendo a contagem de
/// ocorrências por tipo durante a própria emissão, sem reprocessar o texto
/// serializado para totalizar o bloco 9.
struct MontadorEfd {
    registros: Vec<Vec<String>>,
    contagem: BTreeMap<String, usize>,
    /// Tipos na ordem da primeira ocorrência, para emitir os 9900 na mesma
    /// sequência dos blocos do arquivo.
    ordem: Vec<String>,
}

impl MontadorEfd {
    fn new() -> Self {
        Self {
            registros: vec![],
            contagem: BTreeMap::new(),
            ordem: vec![],
        }
    }

    fn emitir(&mut self, campos: Vec<String>) {
        if !self.contagem.contains_key(&campos[0]) {
            self.ordem.push(campos[0].clone());
        }
        *self.contagem.entry(campos[0].clone()).or_insert(0) += 1;
        self.registros.push(campos);
    }

    fn linhas(&self) -> usize {
        self.registros.len()
    }

    fn montar(mut self, input: &EfdInput) -> Vec<Vec<String>> {
        let unidades = unidades_distintas(&input.produtos);

        // bloco 0
        let inicio_bloco_0 = self.linhas();
        self.emitir(registro_0000(&input.config));
        self.emitir(registro_abertura_bloco(Registro::R0001, true));
        for participante in &input.participantes {
            self.emitir(registro_0150(participante));
        }
        for produto in &input.produtos {
            self.emitir(registro_0200(produto));
        }
        for unidade in &unidades {
            self.emitir(registro_0190(unidade));
        }
        let linhas_bloco_0 = self.linhas() - inicio_bloco_0 + 1;
        self.emitir(registro_encerramento_bloco(Registro::R0990, linhas_bloco_0));

        // blocos C e D, entradas antes das saídas, ordem de chegada dentro
        // de cada coleção
        let (entrada_c, entrada_d): (Vec<_>, Vec<_>) = input
            .documentos_entrada
            .iter()
            .partition(|d| !d.bloco_d());
        let (saida_c, saida_d): (Vec<_>, Vec<_>) =
            input.documentos_saida.iter().partition(|d| !d.bloco_d());

        self.montar_bloco_documentos(
            Registro::RC001,
            Registro::RC990,
            &entrada_c,
            &saida_c,
            registro_c100,
            registro_c170,
        );
        self.montar_bloco_documentos(
            Registro::RD001,
            Registro::RD990,
            &entrada_d,
            &saida_d,
            registro_d100,
            registro_d190,
        );

        // bloco H somente quando o inventário foi solicitado e tem itens
        // com estoque positivo
        if let Some(inventario) = &input.inventario {
            let itens: Vec<&ItemInventario> = inventario
                .itens
                .iter()
                .filter(|i| i.quantidade > Decimal::ZERO)
                .collect();
            if !itens.is_empty() {
                let inicio = self.linhas();
                let total = itens
                    .iter()
                    .fold(Decimal::new(0, 2), |acc, i| acc + i.valor_total);
                self.emitir(registro_abertura_bloco(Registro::RH001, true));
                self.emitir(registro_h005(inventario, &total));
                for &item in &itens {
                    self.emitir(registro_h010(item));
                }
                let linhas = self.linhas() - inicio + 1;
                self.emitir(registro_encerramento_bloco(Registro::RH990, linhas));
            }
        }

        // bloco 9: um 9900 por tipo presente no arquivo, inclusive os do
        // próprio bloco 9
        let linhas_corpo = self.linhas();
        self.emitir(registro_abertura_bloco(Registro::R9001, true));

        // um 9900 para cada tipo já emitido mais os três tipos restantes do
        // próprio bloco 9; a quantidade de 9900 é o total de tipos distintos
        let tipos = self.ordem.len() + 3;
        let mut declaracoes: Vec<(String, usize)> = self
            .ordem
            .iter()
            .map(|codigo| (codigo.clone(), self.contagem[codigo]))
            .collect();
        declaracoes.push((Registro::R9900.codigo().to_string(), tipos));
        declaracoes.push((Registro::R9990.codigo().to_string(), 1));
        declaracoes.push((Registro::R9999.codigo().to_string(), 1));

        for (codigo, ocorrencias) in &declaracoes {
            self.emitir(registro_9900(codigo, *ocorrencias));
        }

        // 9990 conta as linhas do bloco 9, ele próprio e o 9999 incluídos
        let linhas_bloco_9 = tipos + 3;
        self.emitir(registro_encerramento_bloco(Registro::R9990, linhas_bloco_9));
        self.emitir(registro_encerramento_bloco(
            Registro::R9999,
            linhas_corpo + linhas_bloco_9,
        ));

        self.registros
    }

    fn montar_bloco_documentos(
        &mut self,
        abertura: Registro,
        encerramento: Registro,
        entradas: &[&DocumentoFiscal],
        saidas: &[&DocumentoFiscal],
        cabecalho: fn(&DocumentoFiscal) -> Vec<String>,
        item: fn(usize, &ItemDocumento) -> Vec<String>,
    ) {
        let inicio = self.linhas();
        let com_dados = !entradas.is_empty() || !saidas.is_empty();
        self.emitir(registro_abertura_bloco(abertura, com_dados));

        for &documento in entradas.iter().chain(saidas.iter()) {
            self.emitir(cabecalho(documento));
            for (indice, item_documento) in documento.itens.iter().enumerate() {
                self.emitir(item(indice + 1, item_documento));
            }
        }

        let linhas = self.linhas() - inicio + 1;
        self.emitir(registro_encerramento_bloco(encerramento, linhas));
    }
}

/// Junta os campos de cada registro com pipe, envolve a linha com pipes e
/// termina cada registro com CRLF, o último inclusive.
fn serializar(registros: &[Vec<String>]) -> String {
    let mut conteudo = String::new();
    for campos in registros {
        conteudo.push('|');
        conteudo.push_str(&campos.join("|"));
        conteudo.push_str("|\r\n");
    }

    conteudo
}

fn deduplicar_participantes(participantes: &[Participante]) -> Vec<Participante> {
    let mut vistos = std::collections::HashSet::new();
    participantes
        .iter()
        .filter(|p| vistos.insert(p.codigo.clone()))
        .cloned()
        .collect()
}

fn deduplicar_produtos(produtos: &[Produto]) -> Vec<Produto> {
    let mut vistos = std::collections::HashSet::new();
    produtos
        .iter()
        .filter(|p| vistos.insert(p.codigo.clone()))
        .cloned()
        .collect()
}

/// Unidades distintas referenciadas pelos produtos, na ordem do primeiro
/// uso. A descrição repete o código, o cadastro de origem não carrega outra.
fn unidades_distintas(produtos: &[Produto]) -> Vec<Unidade> {
    let mut vistas = std::collections::HashSet::new();
    produtos
        .iter()
        .filter(|p| vistas.insert(p.unidade.clone()))
        .map(|p| Unidade {
            codigo: p.unidade.clone(),
            descricao: p.unidade.clone(),
        })
        .collect()
}

fn nome_arquivo(config: &SpedConfig) -> String {
    format!(
        "SPED_{}_{}.txt",
        somente_digitos(&config.cnpj),
        config.periodo_inicio.format("%Y%m")
    )
}

/// Gera o arquivo EFD ICMS/IPI para um período a partir das coleções já
/// materializadas. Valida a identidade fiscal antes de montar qualquer
/// registro e confere o próprio resultado com o validador estrutural; a
/// divergência de totalizadores não é fatal, fica no relatório.
pub fn gerar(input: &EfdInput) -> Result<SpedResult> {
    let vazios = input.config.campos_fiscais_vazios();
    if !vazios.is_empty() {
        bail!("dados fiscais incompletos: {}", vazios.join(", "));
    }

    let entrada = EfdInput {
        config: input.config.clone(),
        participantes: deduplicar_participantes(&input.participantes),
        produtos: deduplicar_produtos(&input.produtos),
        documentos_entrada: input.documentos_entrada.clone(),
        documentos_saida: input.documentos_saida.clone(),
        inventario: input.inventario.clone(),
    };

    log::debug!(
        "montando EFD de {} a {}: {} participantes, {} produtos, {} entradas, {} saídas",
        entrada.config.periodo_inicio,
        entrada.config.periodo_fim,
        entrada.participantes.len(),
        entrada.produtos.len(),
        entrada.documentos_entrada.len(),
        entrada.documentos_saida.len()
    );

    let registros = MontadorEfd::new().montar(&entrada);
    let conteudo = serializar(&registros);
    let validacao = validar(&conteudo);

    log::info!(
        "EFD gerada com {} registros, validação {}",
        registros.len(),
        if validacao.valido { "ok" } else { "com erros" }
    );

    Ok(SpedResult {
        conteudo,
        nome_arquivo: nome_arquivo(&input.config),
        validacao,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> SpedConfig {
        SpedConfig {
            periodo_inicio: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            periodo_fim: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            cnpj: "11.222.333/0001-81".to_string(),
            ie: "110042490114".to_string(),
            razao_social: "Indústria Exemplo Ltda".to_string(),
            uf: "SP".to_string(),
            cod_mun: "3550308".to_string(),
            cod_fin: "0".to_string(),
            ind_perfil: "A".to_string(),
            ind_ativ: "0".to_string(),
        }
    }

    #[test]
    fn test_registro_0000() {
        let campos = registro_0000(&config());
        assert_eq!(campos[0], "0000");
        assert_eq!(campos[3], "01012026");
        assert_eq!(campos[4], "31012026");
        assert_eq!(campos[6], "11222333000181");
        assert_eq!(campos[8], "SP");
    }

    #[test]
    fn test_registro_0200_opcionais_vazios() {
        let produto = Produto {
            codigo: "P1".to_string(),
            descricao: "Parafuso".to_string(),
            cod_barras: None,
            unidade: "UN".to_string(),
            tipo_item: "00".to_string(),
            ncm: None,
            aliquota_icms: Decimal::new(18, 0),
        };

        let campos = registro_0200(&produto);
        assert_eq!(campos.len(), 12);
        assert_eq!(campos[3], "");
        assert_eq!(campos[7], "");
        assert_eq!(campos[11], "18,00");
    }

    #[test]
    fn test_registro_0150_cnpj_ou_cpf_por_tamanho() {
        let mut participante = Participante {
            codigo: "F1".to_string(),
            nome: "Fornecedor Um".to_string(),
            cod_pais: "1058".to_string(),
            documento: "11.222.333/0001-81".to_string(),
            ie: "ISENTO".to_string(),
            cod_mun: "3550308".to_string(),
            endereco: "Rua A".to_string(),
            numero: "10".to_string(),
            bairro: "Centro".to_string(),
        };

        let campos = registro_0150(&participante);
        assert_eq!(campos[4], "11222333000181");
        assert_eq!(campos[5], "");

        participante.documento = "529.982.247-25".to_string();
        let campos = registro_0150(&participante);
        assert_eq!(campos[4], "");
        assert_eq!(campos[5], "52998224725");
    }

    #[test]
    fn test_serializar_pipes_e_crlf() {
        let registros = vec![
            vec!["0001".to_string(), "0".to_string()],
            vec!["0990".to_string(), "2".to_string()],
        ];
        assert_eq!(serializar(&registros), "|0001|0|\r\n|0990|2|\r\n");
    }

    #[test]
    fn test_nome_arquivo() {
        assert_eq!(nome_arquivo(&config()), "SPED_11222333000181_202601.txt");
    }

    #[test]
    fn test_unidades_distintas_ordem_primeiro_uso() {
        let produto = |codigo: &str, unidade: &str| Produto {
            codigo: codigo.to_string(),
            descricao: codigo.to_string(),
            cod_barras: None,
            unidade: unidade.to_string(),
            tipo_item: "00".to_string(),
            ncm: None,
            aliquota_icms: Decimal::ZERO,
        };

        let unidades =
            unidades_distintas(&[produto("P1", "KG"), produto("P2", "UN"), produto("P3", "KG")]);
        let codigos: Vec<&str> = unidades.iter().map(|u| u.codigo.as_str()).collect();
        assert_eq!(codigos, vec!["KG", "UN"]);
    }

    #[test]
    fn test_gerar_falha_sem_identidade_fiscal() {
        let mut config = config();
        config.cnpj = String::new();
        config.uf = String::new();
        let input = EfdInput {
            config,
            participantes: vec![],
            produtos: vec![],
            documentos_entrada: vec![],
            documentos_saida: vec![],
            inventario: None,
        };

        let erro = gerar(&input).unwrap_err().to_string();
        assert!(erro.contains("dados fiscais incompletos"));
        assert!(erro.contains("CNPJ"));
        assert!(erro.contains("UF"));
    }

    #[test]
    fn test_gerar_arquivo_minimo_validado() {
        let input = EfdInput {
            config: config(),
            participantes: vec![],
            produtos: vec![],
            documentos_entrada: vec![],
            documentos_saida: vec![],
            inventario: None,
        };

        let resultado = gerar(&input).unwrap();
        assert!(!resultado.conteudo.is_empty());
        assert!(resultado.validacao.valido, "{:?}", resultado.validacao.erros);
        assert!(resultado.conteudo.starts_with("|0000|"));
        assert!(resultado.conteudo.ends_with("|\r\n"));
    }
}
