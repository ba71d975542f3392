//! 预置设备模型

use iec61850_protocol::{BasicValue, DataSet, Fc, ModelNode, Report, ReportControlBlock, ServerModel};

/// 路灯控制器 IED 名称
pub const SSLD_SERVER_NAME: &str = "SWDeviceGeneric";

/// 路灯事件报告控制块
pub fn ssld_event_rcb() -> String {
    format!("{}IO/LLN0.evn_rpn01", SSLD_SERVER_NAME)
}

/// 路灯控制器模型：4 个开关（XSWC1..4）、配置节点与事件报告
pub fn ssld_model() -> ServerModel {
    let mut model = ServerModel::new();
    let device = format!("{}IO", SSLD_SERVER_NAME);
    for relay in 1..=4u8 {
        let position = format!("{}/XSWC{}.Pos", device, relay);
        model.insert_node(
            ModelNode::new(&position, Fc::St)
                .with("stVal", BasicValue::Bool(false))
                .with("q", BasicValue::Int(0)),
        );
        model.insert_node(
            ModelNode::new(&position, Fc::Co).with("Oper.ctlVal", BasicValue::Bool(false)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/XSWC{}.CfSt", device, relay), Fc::Cf)
                .with("enbOper", BasicValue::Bool(false)),
        );
    }
    model.insert_node(
        ModelNode::new(format!("{}/CSLC.EvnBuf", device), Fc::Cf)
            .with("enbEvnType", BasicValue::Text("LIGHT_EVENTS".to_string())),
    );
    model.insert_node(
        ModelNode::new(format!("{}/CSLC.SWCf", device), Fc::Cf)
            .with("LT", BasicValue::Text(String::new())),
    );
    model.add_rcb(ReportControlBlock::new(ssld_event_rcb(), true));
    model
}

/// 单个系统的逻辑设备节点：LLN0 状态量、测量值、调度设定值
fn add_system(model: &mut ServerModel, device: &str, generation: bool) {
    for (attribute, value) in [("Beh", 1), ("Health", 1), ("Mod", 1)] {
        model.insert_node(
            ModelNode::new(format!("{}/LLN0.{}", device, attribute), Fc::St)
                .with("stVal", BasicValue::Int(value))
                .with("q", BasicValue::Int(0)),
        );
    }
    if generation {
        model.insert_node(
            ModelNode::new(format!("{}/MMXU1.TotW", device), Fc::Mx)
                .with("mag.f", BasicValue::Float(0.0))
                .with("q", BasicValue::Int(0)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/DGEN1.TotWh", device), Fc::Mx)
                .with("actVal", BasicValue::Int(0)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/DGEN1.GnOpSt", device), Fc::St)
                .with("stVal", BasicValue::Int(1)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/DGEN1.OpTmsRs", device), Fc::St)
                .with("stVal", BasicValue::Int(0)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/DGEN1.MaxWLim", device), Fc::Sp)
                .with("setMag.f", BasicValue::Float(0.0)),
        );
        model.insert_node(
            ModelNode::new(format!("{}/DRCC1.OutWSet", device), Fc::Sp)
                .with("setMag.f", BasicValue::Float(0.0)),
        );
        for schedule in 1..=4u8 {
            for attribute in ["SchdId", "SchdTyp", "SchCat"] {
                model.insert_node(
                    ModelNode::new(format!("{}/DSCH{}.{}", device, schedule, attribute), Fc::Sp)
                        .with("setVal", BasicValue::Int(0)),
                );
            }
        }
    } else {
        for attribute in [
            "Alm1", "Alm2", "Alm3", "Alm4", "IntIn1", "Wrn1", "Wrn2", "Wrn3", "Wrn4", "IntIn2",
        ] {
            model.insert_node(
                ModelNode::new(format!("{}/GGIO1.{}", device, attribute), Fc::St)
                    .with("stVal", BasicValue::Int(0))
                    .with("q", BasicValue::Int(0)),
            );
        }
    }
    model.add_rcb(ReportControlBlock::new(format!("{}/LLN0.Status", device), true));
    model.add_rcb(ReportControlBlock::new(
        format!("{}/LLN0.Measurements", device),
        false,
    ));
}

/// RTU 模型：RTU1、PV1、BATTERY1 三个系统
pub fn rtu_model(server_name: &str) -> ServerModel {
    let mut model = ServerModel::new();
    add_system(&mut model, &format!("{}RTU1", server_name), false);
    add_system(&mut model, &format!("{}PV1", server_name), true);
    add_system(&mut model, &format!("{}BATTERY1", server_name), true);
    model
}

/// 路灯事件数据集成员
#[derive(Debug, Clone, Default)]
pub struct EventMember {
    pub evn_type: Option<i64>,
    pub sw_num: Option<i64>,
    pub sw_val: Option<bool>,
    pub trg_type: Option<i64>,
    /// Unix 毫秒
    pub trg_time: Option<i64>,
    pub remark: Option<String>,
}

impl EventMember {
    pub fn into_node(self, index: usize) -> ModelNode {
        let mut node = ModelNode::new(
            format!("{}IO/CSLC.EvnRpn{}", SSLD_SERVER_NAME, index),
            Fc::Br,
        );
        if let Some(value) = self.evn_type {
            node.set("evnType", BasicValue::Int(value));
        }
        if let Some(value) = self.sw_num {
            node.set("swNum", BasicValue::Int(value));
        }
        if let Some(value) = self.sw_val {
            node.set("swVal", BasicValue::Bool(value));
        }
        if let Some(value) = self.trg_type {
            node.set("trgType", BasicValue::Int(value));
        }
        if let Some(value) = self.trg_time {
            node.set("trgTime", BasicValue::Timestamp(value));
        }
        if let Some(value) = self.remark {
            node.set("remark", BasicValue::Text(value));
        }
        node
    }
}

/// 构造路灯事件报告
pub fn ssld_event_report(sq_num: u32, time_of_entry: Option<i64>, members: Vec<EventMember>) -> Report {
    let mut report = Report::new("evn_rpn01", ssld_event_rcb());
    report.sq_num = Some(sq_num);
    report.time_of_entry = time_of_entry;
    report.data_set = Some(DataSet {
        reference: format!("{}IO/LLN0.EvnRpn", SSLD_SERVER_NAME),
        members: members
            .into_iter()
            .enumerate()
            .map(|(index, member)| member.into_node(index + 1))
            .collect(),
    });
    report
}
