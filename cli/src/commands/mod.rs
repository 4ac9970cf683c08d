mod alarm;
mod helpers;
mod intake;
mod notify;
mod supplement;

pub(crate) use alarm::{cmd_alarm_cancel, cmd_alarm_set, cmd_alarm_show};
pub(crate) use intake::{cmd_history, cmd_mark, cmd_mark_all, cmd_take, cmd_today};
pub(crate) use notify::{cmd_notify_fire, cmd_notify_list};
pub(crate) use supplement::{
    cmd_supplement_add, cmd_supplement_clear, cmd_supplement_list, cmd_supplement_remove,
    cmd_supplement_suggest,
};
